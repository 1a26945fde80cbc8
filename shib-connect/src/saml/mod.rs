mod sp;

use async_trait::async_trait;
use mockall::automock;

use shib_slo::Result;

use crate::{AcsRequest, AssertionResult};

pub use sp::{ShibbolethSp, ShibbolethSpConfig};

/// SAMLEngine is the seam to whatever validates inbound SAML responses.
///
/// Implementations decode, verify and map the response (or read the result
/// of a fronting service provider that already did so). A response that the
/// IdP or the engine rejected is not an `Err`: it comes back as an
/// `AssertionResult` with `error_reason` set or `authenticated` false.
/// `Err` is reserved for the engine itself failing.
#[automock]
#[async_trait]
pub trait SAMLEngine: Send + Sync {
    async fn process_response(&self, req: &AcsRequest)
        -> Result<AssertionResult>;
}
