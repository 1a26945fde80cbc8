mod assertion;
pub mod saml;

pub use assertion::{AcsRequest, AssertionResult};
