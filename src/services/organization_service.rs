//! Organization service - admin-gated changes to congregations and networks

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::db::models::{Congregation, Network};
use crate::db::{org_graph, organization, Database, TenantContext};
use crate::error::ServiceError;

use super::access::require_admin;
use super::events::{EventBus, OrgEvent};
use super::scope::resolve_scope;

/// Kids network pastors must carry this gender marker
const KIDS_PASTOR_GENDER: &str = "F";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPastorInput {
    /// `None` clears the pastor
    #[serde(default)]
    pub pastor_id: Option<String>,
}

pub struct OrganizationService {
    db: Arc<Database>,
    events: Arc<EventBus>,
}

impl OrganizationService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Make `congregation_id` the tenant's only principal congregation
    pub fn set_principal_congregation(
        &self,
        ctx: &TenantContext,
        member_id: &str,
        congregation_id: &str,
    ) -> Result<Congregation, ServiceError> {
        let congregation = self.db.with_transaction(|conn| {
            let scope = resolve_scope(conn, ctx, member_id)?;
            require_admin(&scope)?;
            if org_graph::find_congregation(conn, ctx, congregation_id)?.is_none() {
                return Err(ServiceError::not_found("congregation", congregation_id));
            }
            organization::set_principal_congregation(conn, ctx, congregation_id)?;
            org_graph::find_congregation(conn, ctx, congregation_id)?
                .ok_or_else(|| ServiceError::Internal("Failed to retrieve updated congregation".into()))
        })?;

        self.events.emit(OrgEvent::PrincipalCongregationChanged {
            matrix_id: ctx.matrix_id.clone(),
            congregation_id: congregation.id.clone(),
        });
        Ok(congregation)
    }

    /// Set or clear a network's pastor; kids networks need a female pastor
    pub fn assign_network_pastor(
        &self,
        ctx: &TenantContext,
        member_id: &str,
        network_id: &str,
        input: AssignPastorInput,
    ) -> Result<Network, ServiceError> {
        let pastor_id = input.pastor_id.as_deref().map(str::trim).filter(|id| !id.is_empty());

        let network = self.db.with_transaction(|conn| {
            let scope = resolve_scope(conn, ctx, member_id)?;
            require_admin(&scope)?;
            let network = org_graph::find_network(conn, ctx, network_id)?
                .ok_or_else(|| ServiceError::not_found("network", network_id))?;

            if let Some(pastor_id) = pastor_id {
                let pastor = org_graph::find_member(conn, ctx, pastor_id)?
                    .ok_or_else(|| ServiceError::not_found("member", pastor_id))?;
                if network.is_kids() && pastor.gender.as_deref() != Some(KIDS_PASTOR_GENDER) {
                    warn!(matrix_id = %ctx.matrix_id, network_id = %network_id, pastor_id = %pastor_id, "Rejected kids network pastor");
                    return Err(ServiceError::InvalidInput(format!(
                        "kids network {} requires a female pastor",
                        network_id
                    )));
                }
            }

            organization::set_network_pastor(conn, ctx, network_id, pastor_id)?;
            org_graph::find_network(conn, ctx, network_id)?
                .ok_or_else(|| ServiceError::Internal("Failed to retrieve updated network".into()))
        })?;

        self.events.emit(OrgEvent::NetworkPastorAssigned {
            matrix_id: ctx.matrix_id.clone(),
            network_id: network.id.clone(),
            pastor_id: network.pastor_id.clone(),
        });
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::Fixture;

    fn service(fx: &Fixture) -> OrganizationService {
        OrganizationService::new(fx.db.clone(), Arc::new(EventBus::new()))
    }

    #[test]
    fn test_principal_switch_requires_admin() {
        let fx = Fixture::new();
        fx.congregation("a", "North");
        fx.congregation("b", "South");
        fx.member("pleb", None);
        fx.admin("root");
        let svc = service(&fx);

        let denied = svc.set_principal_congregation(&fx.ctx, "pleb", "a");
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));

        svc.set_principal_congregation(&fx.ctx, "root", "a").unwrap();
        let b = svc.set_principal_congregation(&fx.ctx, "root", "b").unwrap();
        assert_eq!(b.is_principal, 1);

        let principals = fx.run(|conn| organization::principal_congregations(conn, &fx.ctx)).unwrap();
        assert_eq!(principals, vec!["b".to_string()]);

        let missing = svc.set_principal_congregation(&fx.ctx, "root", "ghost");
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_kids_network_pastor_gender_rule() {
        let fx = Fixture::new();
        fx.congregation("cong", "Central");
        fx.network("kids", "cong", true);
        fx.network("adults", "cong", false);
        fx.member_with("him", None, None, Some("M"));
        fx.member_with("her", None, None, Some("F"));
        fx.admin("root");
        let svc = service(&fx);
        let assign = |id: &str| AssignPastorInput {
            pastor_id: Some(id.into()),
        };

        let rejected = svc.assign_network_pastor(&fx.ctx, "root", "kids", assign("him"));
        assert!(matches!(rejected, Err(ServiceError::InvalidInput(_))));

        let kids = svc.assign_network_pastor(&fx.ctx, "root", "kids", assign("her")).unwrap();
        assert_eq!(kids.pastor_id.as_deref(), Some("her"));

        let adults = svc.assign_network_pastor(&fx.ctx, "root", "adults", assign("him")).unwrap();
        assert_eq!(adults.pastor_id.as_deref(), Some("him"));

        let cleared = svc
            .assign_network_pastor(&fx.ctx, "root", "kids", AssignPastorInput::default())
            .unwrap();
        assert_eq!(cleared.pastor_id, None);
    }

    #[test]
    fn test_assign_pastor_unknown_ids() {
        let fx = Fixture::new();
        fx.congregation("cong", "Central");
        fx.network("net", "cong", false);
        fx.admin("root");
        let svc = service(&fx);

        let no_network = svc.assign_network_pastor(&fx.ctx, "root", "ghost", AssignPastorInput::default());
        assert!(matches!(no_network, Err(ServiceError::NotFound(_))));

        let no_member = svc.assign_network_pastor(
            &fx.ctx,
            "root",
            "net",
            AssignPastorInput {
                pastor_id: Some("ghost".into()),
            },
        );
        assert!(matches!(no_member, Err(ServiceError::NotFound(_))));
    }
}
