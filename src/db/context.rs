//! Tenant context for multi-tenant database operations
//!
//! Every congregation, network, cell, member and report row belongs to
//! exactly one tenant (a "matrix"). All repository functions take a
//! `TenantContext` and filter by `matrix_id`; there is no ambient tenant.

/// Tenant context passed to all database operations for isolation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantContext {
    /// Matrix identifier scoping every query and mutation
    pub matrix_id: String,
}

impl TenantContext {
    /// Create a new tenant context for the given matrix
    pub fn new(matrix_id: impl Into<String>) -> Self {
        Self {
            matrix_id: matrix_id.into(),
        }
    }

    pub fn matrix_id(&self) -> &str {
        &self.matrix_id
    }
}

impl std::fmt::Display for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TenantContext({})", self.matrix_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_context() {
        let ctx = TenantContext::new("matrix-a");
        assert_eq!(ctx.matrix_id(), "matrix-a");
        assert_eq!(ctx.to_string(), "TenantContext(matrix-a)");
    }

    #[test]
    fn test_contexts_compare_by_matrix() {
        assert_eq!(TenantContext::new("a"), TenantContext::new("a"));
        assert_ne!(TenantContext::new("a"), TenantContext::new("b"));
    }
}
