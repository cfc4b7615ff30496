//! ReturnPathCheck — envelope sender vs. `From` domain mismatch
//! (spec §4.H.2)

use crate::checks::PhishingCheck;
use crate::domain::base_domain;
use crate::email::{AnalysisContext, ParsedEmail};
use crate::checks::CheckInputs;
use crate::models::CheckResult;

pub struct ReturnPathCheck;

impl PhishingCheck for ReturnPathCheck {
    fn name(&self) -> &'static str {
        "ReturnPathCheck"
    }

    fn analyze(&self, email: &ParsedEmail, _ctx: &AnalysisContext, _inputs: &CheckInputs) -> Vec<CheckResult> {
        let Some(return_path_domain) = email.return_path_domain.as_deref() else {
            return Vec::new();
        };
        if return_path_domain.is_empty() || email.from_domain.is_empty() {
            return Vec::new();
        }

        let from_base = base_domain(&email.from_domain);
        let return_path_base = base_domain(return_path_domain);
        if from_base == return_path_base {
            return Vec::new();
        }

        vec![CheckResult::new(
            self.name(),
            3,
            format!("From domain {from_base} does not match return-path domain {return_path_base}"),
        )]
    }
}
