mod identity;

pub use identity::IdentityImpl;
