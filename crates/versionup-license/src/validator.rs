use anyhow::Result;
use tracing::{debug, info, warn};
use versionup_state::PurchaseSentinel;

use crate::{parse_validation_response, LicenseChecker, PurchaseRequest, ValidationResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseCheck {
    AlreadyChecked,
    Validated { license_code: String },
    Rejected { message: String },
}

/// One-shot purchase validation gated by the sentinel file.
///
/// The sentinel is claimed before the request goes out, so a slow or failed
/// check is never retried by a later run.
pub struct PurchaseValidator<'a> {
    sentinel: &'a PurchaseSentinel,
    checker: &'a dyn LicenseChecker,
}

impl<'a> PurchaseValidator<'a> {
    pub fn new(sentinel: &'a PurchaseSentinel, checker: &'a dyn LicenseChecker) -> Self {
        Self { sentinel, checker }
    }

    pub fn validate_once(&self, request: &PurchaseRequest) -> Result<PurchaseCheck> {
        if !self.sentinel.mark_checked()? {
            debug!(sentinel = %self.sentinel.path().display(), "purchase code already checked");
            return Ok(PurchaseCheck::AlreadyChecked);
        }

        let response = match self.checker.fetch_validation(request) {
            Ok(body) => parse_validation_response(&body),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "license validation request failed");
                ValidationResponse::rejected(format!("Invalid purchase code. {err:#}"))
            }
        };

        if response.valid {
            let license_code = response.license_code.unwrap_or_default();
            self.sentinel.record_license(&license_code)?;
            info!("purchase code validated");
            Ok(PurchaseCheck::Validated { license_code })
        } else {
            warn!(message = %response.message, "purchase code rejected");
            Ok(PurchaseCheck::Rejected {
                message: response.message,
            })
        }
    }
}
