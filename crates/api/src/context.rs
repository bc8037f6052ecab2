use keystone_auth::Principal;

/// Principal resolved for a request by the bearer middleware.
///
/// Always present on routed requests; anonymous when no usable token was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
