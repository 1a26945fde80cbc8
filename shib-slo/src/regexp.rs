use regex::Regex;
use validator::ValidationError;

lazy_static::lazy_static! {
    static ref FIELD_NAME_REGEX: Regex = Regex::new(
        r"^[A-Za-z][A-Za-z0-9_]{0,63}$",
    ).unwrap();
}

// 以字母开头，只包含字母、数字和下划线，长度不超过64位
pub fn check_field_name(name: &str) -> Result<(), ValidationError> {
    if FIELD_NAME_REGEX.is_match(name) {
        return Ok(());
    }
    Err(ValidationError::new("invalid field name"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names() {
        assert!(check_field_name("GUID").is_ok());
        assert!(check_field_name("FirstName").is_ok());
        assert!(check_field_name("saml_session_index").is_ok());
        assert!(check_field_name("").is_err());
        assert!(check_field_name("1st").is_err());
        assert!(check_field_name("Email; DROP").is_err());
    }
}
