mod checker;
mod response;
mod validator;

pub use checker::{HttpLicenseChecker, LicenseChecker, PurchaseRequest};
pub use response::{parse_validation_response, ValidationResponse};
pub use validator::{PurchaseCheck, PurchaseValidator};
