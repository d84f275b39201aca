// Test utilities for services crate
#![cfg(test)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::activity::{Activity, ActivityLog};
use crate::common::{Page, PageQuery, RepositoryError};
use crate::environment::{Environment, EnvironmentStore};
use crate::organization::{Organization, OrganizationGroup, OrganizationStore};
use crate::permissions::{
    Permission, ResourcePolicyRepository, ResourcePolicyStore, TenantPolicyRepository,
};
use crate::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

/// Key of a resource policy: (group, resource uri, resource type)
pub type PolicyKey = (String, String, String);

#[derive(Debug, Clone, Default)]
pub struct InMemoryState {
    pub organizations: BTreeMap<String, Organization>,
    /// Keyed by (organization uri, group)
    pub memberships: BTreeMap<(String, String), OrganizationGroup>,
    pub environments: BTreeMap<String, Environment>,
    pub resource_policies: HashMap<PolicyKey, Vec<Permission>>,
    pub tenant_policies: HashMap<String, Vec<Permission>>,
    pub activities: Vec<Activity>,
}

/// In-memory database. Units of work operate on a snapshot that is written
/// back only on commit, so dropped units of work leave no trace.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<Mutex<InMemoryState>>,
    begun: Arc<Mutex<usize>>,
    committed: Arc<Mutex<usize>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> InMemoryState {
        self.state.lock().unwrap().clone()
    }

    pub fn with_state(&self, f: impl FnOnce(&mut InMemoryState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn begun(&self) -> usize {
        *self.begun.lock().unwrap()
    }

    pub fn committed(&self) -> usize {
        *self.committed.lock().unwrap()
    }

    pub fn grant_tenant(&self, group: &str, permissions: &[Permission]) {
        self.with_state(|s| {
            s.tenant_policies
                .insert(group.to_string(), permissions.to_vec());
        });
    }

    pub fn add_environment(&self, environment: Environment) {
        self.with_state(|s| {
            s.environments
                .insert(environment.environment_uri.clone(), environment);
        });
    }

    pub fn policy(&self, group: &str, resource_uri: &str) -> Option<Vec<Permission>> {
        self.snapshot()
            .resource_policies
            .iter()
            .find(|((g, r, _), _)| g == group && r == resource_uri)
            .map(|(_, p)| p.clone())
    }
}

pub struct InMemoryUnitOfWork {
    working: InMemoryState,
    database: InMemoryDatabase,
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        *self.begun.lock().unwrap() += 1;
        Ok(Box::new(InMemoryUnitOfWork {
            working: self.snapshot(),
            database: self.clone(),
        }))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        *self.database.state.lock().unwrap() = self.working;
        *self.database.committed.lock().unwrap() += 1;
        Ok(())
    }
}

fn paginate<T: Clone>(items: Vec<T>, query: &PageQuery) -> Page<T> {
    let count = items.len() as i64;
    let nodes = items
        .into_iter()
        .skip(query.offset() as usize)
        .take(query.limit() as usize)
        .collect();
    Page::new(nodes, count, query)
}

fn matches_term(term: &Option<String>, fields: &[&str]) -> bool {
    match term {
        None => true,
        Some(term) => fields.iter().any(|f| f.to_lowercase().contains(term)),
    }
}

#[async_trait]
impl OrganizationStore for InMemoryUnitOfWork {
    async fn get_organization(
        &mut self,
        organization_uri: &str,
    ) -> Result<Option<Organization>, RepositoryError> {
        Ok(self.working.organizations.get(organization_uri).cloned())
    }

    async fn insert_organization(
        &mut self,
        organization: &Organization,
    ) -> Result<(), RepositoryError> {
        let mut stored = organization.clone();
        stored.user_role_in_organization = None;
        self.working
            .organizations
            .insert(stored.organization_uri.clone(), stored);
        Ok(())
    }

    async fn update_organization(
        &mut self,
        organization: &Organization,
    ) -> Result<(), RepositoryError> {
        match self
            .working
            .organizations
            .get_mut(&organization.organization_uri)
        {
            Some(stored) => {
                stored.label = organization.label.clone();
                stored.description = organization.description.clone();
                stored.tags = organization.tags.clone();
                stored.updated = organization.updated;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(
                organization.organization_uri.clone(),
            )),
        }
    }

    async fn delete_organization(&mut self, organization_uri: &str) -> Result<bool, RepositoryError> {
        Ok(self.working.organizations.remove(organization_uri).is_some())
    }

    async fn list_user_organizations(
        &mut self,
        username: &str,
        groups: &[String],
        query: &PageQuery,
    ) -> Result<Page<Organization>, RepositoryError> {
        let term = query.normalized_term();
        let visible: Vec<Organization> = self
            .working
            .organizations
            .values()
            .filter(|o| {
                o.owner == username
                    || groups.contains(&o.saml_group_name)
                    || groups.iter().any(|g| {
                        self.working
                            .memberships
                            .contains_key(&(o.organization_uri.clone(), g.clone()))
                    })
            })
            .filter(|o| {
                let tags = o.tags.join(" ");
                matches_term(&term, &[o.label.as_str(), o.description.as_str(), tags.as_str()])
            })
            .cloned()
            .collect();
        Ok(paginate(visible, query))
    }

    async fn find_group_membership(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<Option<OrganizationGroup>, RepositoryError> {
        Ok(self
            .working
            .memberships
            .get(&(organization_uri.to_string(), group.to_string()))
            .cloned())
    }

    async fn find_organization_membership(
        &mut self,
        organization_uri: &str,
        groups: &[String],
    ) -> Result<Option<OrganizationGroup>, RepositoryError> {
        Ok(groups.iter().find_map(|g| {
            self.working
                .memberships
                .get(&(organization_uri.to_string(), g.clone()))
                .cloned()
        }))
    }

    async fn insert_group_membership(
        &mut self,
        membership: &OrganizationGroup,
    ) -> Result<(), RepositoryError> {
        let key = (
            membership.organization_uri.clone(),
            membership.group_uri.clone(),
        );
        if self.working.memberships.contains_key(&key) {
            return Err(RepositoryError::AlreadyExists);
        }
        self.working.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn delete_group_membership(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .working
            .memberships
            .remove(&(organization_uri.to_string(), group.to_string()))
            .is_some())
    }

    async fn list_organization_groups(
        &mut self,
        organization_uri: &str,
        query: &PageQuery,
    ) -> Result<Page<OrganizationGroup>, RepositoryError> {
        let term = query.normalized_term();
        let groups: Vec<OrganizationGroup> = self
            .working
            .memberships
            .values()
            .filter(|m| m.organization_uri == organization_uri)
            .filter(|m| matches_term(&term, &[m.group_uri.as_str()]))
            .cloned()
            .collect();
        Ok(paginate(groups, query))
    }

    async fn count_invited_groups(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<i64, RepositoryError> {
        Ok(self
            .working
            .memberships
            .values()
            .filter(|m| m.organization_uri == organization_uri && m.group_uri != group)
            .count() as i64)
    }
}

#[async_trait]
impl EnvironmentStore for InMemoryUnitOfWork {
    async fn get_environment(
        &mut self,
        environment_uri: &str,
    ) -> Result<Option<Environment>, RepositoryError> {
        Ok(self.working.environments.get(environment_uri).cloned())
    }

    async fn count_organization_environments(
        &mut self,
        organization_uri: &str,
    ) -> Result<i64, RepositoryError> {
        Ok(self
            .working
            .environments
            .values()
            .filter(|e| e.organization_uri == organization_uri)
            .count() as i64)
    }

    async fn count_group_environments(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<i64, RepositoryError> {
        Ok(self
            .working
            .environments
            .values()
            .filter(|e| e.organization_uri == organization_uri && e.saml_group_name == group)
            .count() as i64)
    }

    async fn list_organization_environments(
        &mut self,
        organization_uri: &str,
        query: &PageQuery,
    ) -> Result<Page<Environment>, RepositoryError> {
        let term = query.normalized_term();
        let environments: Vec<Environment> = self
            .working
            .environments
            .values()
            .filter(|e| e.organization_uri == organization_uri)
            .filter(|e| {
                let description = e.description.clone().unwrap_or_default();
                matches_term(&term, &[e.label.as_str(), description.as_str(), e.region.as_str()])
            })
            .cloned()
            .collect();
        Ok(paginate(environments, query))
    }
}

#[async_trait]
impl ResourcePolicyStore for InMemoryUnitOfWork {
    async fn attach_resource_policy(
        &mut self,
        group: &str,
        permissions: &[Permission],
        resource_uri: &str,
        resource_type: &str,
    ) -> Result<(), RepositoryError> {
        self.working.resource_policies.insert(
            (
                group.to_string(),
                resource_uri.to_string(),
                resource_type.to_string(),
            ),
            permissions.to_vec(),
        );
        Ok(())
    }

    async fn delete_resource_policy(
        &mut self,
        group: &str,
        resource_uri: &str,
        resource_type: &str,
    ) -> Result<(), RepositoryError> {
        self.working.resource_policies.remove(&(
            group.to_string(),
            resource_uri.to_string(),
            resource_type.to_string(),
        ));
        Ok(())
    }
}

#[async_trait]
impl ActivityLog for InMemoryUnitOfWork {
    async fn append_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError> {
        self.working.activities.push(activity.clone());
        Ok(())
    }
}

#[async_trait]
impl ResourcePolicyRepository for InMemoryDatabase {
    async fn find_permissions(
        &self,
        groups: &[String],
        resource_uri: &str,
    ) -> Result<Vec<Permission>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .resource_policies
            .iter()
            .filter(|((g, r, _), _)| r == resource_uri && groups.contains(g))
            .flat_map(|(_, p)| p.iter().copied())
            .collect())
    }
}

#[async_trait]
impl TenantPolicyRepository for InMemoryDatabase {
    async fn find_permissions(&self, groups: &[String]) -> Result<Vec<Permission>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(groups
            .iter()
            .filter_map(|g| state.tenant_policies.get(g))
            .flat_map(|p| p.iter().copied())
            .collect())
    }
}

mod tests {
    use super::*;
    use chrono::Utc;

    fn membership(group: &str) -> OrganizationGroup {
        OrganizationGroup {
            organization_uri: "org00001".to_string(),
            group_uri: group.to_string(),
            invited_by: None,
            created: Utc::now(),
        }
    }

    #[test]
    fn test_dropped_unit_of_work_leaves_no_trace() {
        let db = InMemoryDatabase::new();

        tokio_test::block_on(async {
            let mut uow = db.begin().await.unwrap();
            uow.insert_group_membership(&membership("Analysts"))
                .await
                .unwrap();
            drop(uow);
        });
        assert!(db.snapshot().memberships.is_empty());

        tokio_test::block_on(async {
            let mut uow = db.begin().await.unwrap();
            uow.insert_group_membership(&membership("Analysts"))
                .await
                .unwrap();
            let err = uow
                .insert_group_membership(&membership("Analysts"))
                .await
                .unwrap_err();
            assert!(matches!(err, RepositoryError::AlreadyExists));
            uow.commit().await.unwrap();
        });
        assert_eq!(db.snapshot().memberships.len(), 1);
        assert_eq!(db.committed(), 1);
    }
}
