//! Access patterns backed by caller-supplied closures.

use async_trait::async_trait;

use warden_contracts::{
    access::{AccessContext, AccessPatternResult},
    error::WardenResult,
};
use warden_core::traits::AccessPattern;

/// Applicability predicate for a custom pattern.
pub type AppliesFn = Box<dyn Fn(&AccessContext) -> bool + Send + Sync>;

/// Validation function for a custom pattern. An `Err` is turned into a deny
/// by the evaluator.
pub type ValidateFn = Box<dyn Fn(&AccessContext) -> WardenResult<AccessPatternResult> + Send + Sync>;

/// A pattern whose behaviour is entirely supplied by the host application.
pub struct CustomAccessPattern {
    id: String,
    description: String,
    priority: i32,
    applies: AppliesFn,
    validate: ValidateFn,
}

impl CustomAccessPattern {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        applies: AppliesFn,
        validate: ValidateFn,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            priority,
            applies,
            validate,
        }
    }
}

#[async_trait]
impl AccessPattern for CustomAccessPattern {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, ctx: &AccessContext) -> WardenResult<bool> {
        Ok((self.applies)(ctx))
    }

    async fn validate(&self, ctx: &AccessContext) -> WardenResult<AccessPatternResult> {
        (self.validate)(ctx)
    }
}
