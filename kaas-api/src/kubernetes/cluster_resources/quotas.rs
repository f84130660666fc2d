//! ResourceQuota operations
//!
//! Every managed namespace carries a single quota object named
//! `project-quota`. Writes converge: create falls through to update when the
//! object already exists and update falls back to create when it is absent.

use k8s_openapi::api::core::v1::{ResourceQuota as K8sResourceQuota, ResourceQuotaSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use std::collections::BTreeMap;

use kaas_common::{ResourceQuota, ResourceUsage};

use crate::kubernetes::client::K8sClient;
use crate::kubernetes::error::{ignore_not_found, K8sResult};
use crate::kubernetes::types::PROJECT_QUOTA_NAME;

const KEY_CPU: &str = "cpu";
const KEY_MEMORY: &str = "memory";
const KEY_STORAGE: &str = "requests.storage";
const KEY_PODS: &str = "pods";
const KEY_SERVICES: &str = "services";
const KEY_PVCS: &str = "persistentvolumeclaims";

/// Hard limits for a quota; unset, empty and zero fields are left out
pub fn quota_to_hard(quota: &ResourceQuota) -> BTreeMap<String, Quantity> {
    let mut hard = BTreeMap::new();

    let strings = [
        (KEY_CPU, &quota.cpu),
        (KEY_MEMORY, &quota.memory),
        (KEY_STORAGE, &quota.storage),
    ];
    for (key, value) in strings {
        if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            hard.insert(key.to_string(), Quantity(v.to_string()));
        }
    }

    let counts = [
        (KEY_PODS, quota.pods),
        (KEY_SERVICES, quota.services),
        (KEY_PVCS, quota.persistent_volume_claims),
    ];
    for (key, value) in counts {
        if let Some(n) = value.filter(|n| *n > 0) {
            hard.insert(key.to_string(), Quantity(n.to_string()));
        }
    }

    hard
}

/// Inverse of [`quota_to_hard`]
pub fn hard_to_quota(hard: &BTreeMap<String, Quantity>) -> ResourceQuota {
    let text = |key: &str| hard.get(key).map(|q| q.0.clone());
    let count = |key: &str| hard.get(key).and_then(|q| q.0.parse::<u32>().ok());

    ResourceQuota {
        cpu: text(KEY_CPU),
        memory: text(KEY_MEMORY),
        storage: text(KEY_STORAGE),
        pods: count(KEY_PODS),
        services: count(KEY_SERVICES),
        persistent_volume_claims: count(KEY_PVCS),
    }
}

/// Consumption reported in a quota's status
pub fn usage_from_quota(quota: &K8sResourceQuota) -> ResourceUsage {
    let used = quota.status.as_ref().and_then(|s| s.used.as_ref());
    let Some(used) = used else {
        return ResourceUsage::zero();
    };

    let text = |key: &str| {
        used.get(key)
            .map(|q| q.0.clone())
            .unwrap_or_else(|| "0".to_string())
    };

    ResourceUsage {
        cpu: text(KEY_CPU),
        memory: text(KEY_MEMORY),
        storage: text(KEY_STORAGE),
        pods: used
            .get(KEY_PODS)
            .and_then(|q| q.0.parse::<i64>().ok())
            .unwrap_or(0),
    }
}

fn build_quota(namespace: &str, quota: &ResourceQuota) -> K8sResourceQuota {
    K8sResourceQuota {
        metadata: ObjectMeta {
            name: Some(PROJECT_QUOTA_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ResourceQuotaSpec {
            hard: Some(quota_to_hard(quota)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Create the quota, or update it when it already exists
pub async fn apply_resource_quota(
    client: &K8sClient,
    namespace: &str,
    quota: &ResourceQuota,
) -> K8sResult<()> {
    let quotas: Api<K8sResourceQuota> = Api::namespaced(client.inner().clone(), namespace);

    match quotas.get_opt(PROJECT_QUOTA_NAME).await? {
        Some(existing) => replace_hard(&quotas, existing, quota).await,
        None => {
            quotas
                .create(&PostParams::default(), &build_quota(namespace, quota))
                .await?;
            Ok(())
        }
    }
}

/// Create the quota; an existing object is updated in place
pub async fn create_resource_quota(
    client: &K8sClient,
    namespace: &str,
    quota: &ResourceQuota,
) -> K8sResult<()> {
    let quotas: Api<K8sResourceQuota> = Api::namespaced(client.inner().clone(), namespace);

    match quotas
        .create(&PostParams::default(), &build_quota(namespace, quota))
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            tracing::debug!(namespace, "Quota exists, updating instead");
            let existing = quotas.get(PROJECT_QUOTA_NAME).await?;
            replace_hard(&quotas, existing, quota).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Update the quota; an absent object is created
pub async fn update_resource_quota(
    client: &K8sClient,
    namespace: &str,
    quota: &ResourceQuota,
) -> K8sResult<()> {
    let quotas: Api<K8sResourceQuota> = Api::namespaced(client.inner().clone(), namespace);

    match quotas.get_opt(PROJECT_QUOTA_NAME).await? {
        Some(existing) => replace_hard(&quotas, existing, quota).await,
        None => {
            tracing::debug!(namespace, "Quota absent, creating instead");
            create_resource_quota(client, namespace, quota).await
        }
    }
}

async fn replace_hard(
    quotas: &Api<K8sResourceQuota>,
    mut existing: K8sResourceQuota,
    quota: &ResourceQuota,
) -> K8sResult<()> {
    existing.spec.get_or_insert_with(Default::default).hard = Some(quota_to_hard(quota));
    quotas
        .replace(PROJECT_QUOTA_NAME, &PostParams::default(), &existing)
        .await?;
    Ok(())
}

/// Limits currently set on the namespace; `None` without a quota object
pub async fn get_resource_quota(client: &K8sClient, namespace: &str) -> K8sResult<Option<ResourceQuota>> {
    let quotas: Api<K8sResourceQuota> = Api::namespaced(client.inner().clone(), namespace);

    Ok(quotas.get_opt(PROJECT_QUOTA_NAME).await?.map(|q| {
        q.spec
            .and_then(|s| s.hard)
            .map(|hard| hard_to_quota(&hard))
            .unwrap_or_default()
    }))
}

pub async fn delete_resource_quota(client: &K8sClient, namespace: &str) -> K8sResult<()> {
    let quotas: Api<K8sResourceQuota> = Api::namespaced(client.inner().clone(), namespace);

    ignore_not_found(
        quotas
            .delete(PROJECT_QUOTA_NAME, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(Into::into),
    )
}

/// Quota consumption for a namespace; zeroed when no quota object exists
pub async fn get_namespace_usage(client: &K8sClient, namespace: &str) -> K8sResult<ResourceUsage> {
    let quotas: Api<K8sResourceQuota> = Api::namespaced(client.inner().clone(), namespace);

    Ok(quotas
        .get_opt(PROJECT_QUOTA_NAME)
        .await?
        .map(|q| usage_from_quota(&q))
        .unwrap_or_else(ResourceUsage::zero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ResourceQuotaStatus;

    #[test]
    fn test_quota_to_hard_skips_unset_fields() {
        let quota = ResourceQuota {
            cpu: Some("2".into()),
            memory: Some("4Gi".into()),
            storage: Some(String::new()),
            pods: Some(0),
            services: Some(5),
            persistent_volume_claims: None,
        };

        let hard = quota_to_hard(&quota);
        assert_eq!(hard.len(), 3);
        assert_eq!(hard["cpu"], Quantity("2".into()));
        assert_eq!(hard["memory"], Quantity("4Gi".into()));
        assert_eq!(hard["services"], Quantity("5".into()));
        assert!(!hard.contains_key("requests.storage"));
        assert!(!hard.contains_key("pods"));
    }

    #[test]
    fn test_storage_and_claims_keys() {
        let quota = ResourceQuota {
            storage: Some("100Gi".into()),
            persistent_volume_claims: Some(4),
            ..Default::default()
        };

        let hard = quota_to_hard(&quota);
        assert_eq!(hard["requests.storage"], Quantity("100Gi".into()));
        assert_eq!(hard["persistentvolumeclaims"], Quantity("4".into()));
        assert_eq!(hard_to_quota(&hard), quota);
    }

    #[test]
    fn test_empty_quota_has_no_limits() {
        assert!(quota_to_hard(&ResourceQuota::default()).is_empty());
    }

    #[test]
    fn test_usage_from_status() {
        let quota = K8sResourceQuota {
            status: Some(ResourceQuotaStatus {
                used: Some(BTreeMap::from([
                    ("cpu".to_string(), Quantity("500m".into())),
                    ("memory".to_string(), Quantity("1Gi".into())),
                    ("pods".to_string(), Quantity("3".into())),
                ])),
                ..Default::default()
            }),
            ..Default::default()
        };

        let usage = usage_from_quota(&quota);
        assert_eq!(usage.cpu, "500m");
        assert_eq!(usage.memory, "1Gi");
        assert_eq!(usage.storage, "0");
        assert_eq!(usage.pods, 3);
    }

    #[test]
    fn test_usage_without_status_is_zero() {
        assert_eq!(usage_from_quota(&K8sResourceQuota::default()), ResourceUsage::zero());
    }
}
