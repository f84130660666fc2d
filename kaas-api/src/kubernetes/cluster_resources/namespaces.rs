//! Namespace operations

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use std::collections::BTreeMap;

use crate::kubernetes::client::K8sClient;
use crate::kubernetes::error::{ignore_not_found, K8sError, K8sResult};
use crate::kubernetes::types::{foreign_owner, NamespaceInfo};

/// List namespaces, optionally narrowed by a label selector
pub async fn list_namespaces(client: &K8sClient, label_selector: Option<&str>) -> K8sResult<Vec<NamespaceInfo>> {
    let namespaces: Api<Namespace> = Api::all(client.inner().clone());

    let mut params = ListParams::default();
    if let Some(selector) = label_selector {
        params = params.labels(selector);
    }
    let list = namespaces.list(&params).await?;

    Ok(list.items.into_iter().map(namespace_to_info).collect())
}

/// Get a namespace; `None` when it does not exist
pub async fn get_namespace(client: &K8sClient, name: &str) -> K8sResult<Option<NamespaceInfo>> {
    let namespaces: Api<Namespace> = Api::all(client.inner().clone());
    Ok(namespaces.get_opt(name).await?.map(namespace_to_info))
}

/// Create a namespace. An existing namespace with the same name is returned as is,
/// unless it is labelled for a different project.
pub async fn create_namespace(
    client: &K8sClient,
    name: &str,
    labels: &BTreeMap<String, String>,
) -> K8sResult<NamespaceInfo> {
    let namespaces: Api<Namespace> = Api::all(client.inner().clone());

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: if labels.is_empty() {
                None
            } else {
                Some(labels.clone())
            },
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(created) => Ok(namespace_to_info(created)),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            tracing::debug!(namespace = name, "Namespace already exists");
            let existing = namespace_to_info(namespaces.get(name).await?);
            if let Some(owner) = foreign_owner(&existing, labels) {
                return Err(K8sError::NamespaceOwnedElsewhere {
                    name: name.to_string(),
                    owner: owner.to_string(),
                });
            }
            Ok(existing)
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a namespace; an absent namespace counts as deleted
pub async fn delete_namespace(client: &K8sClient, name: &str) -> K8sResult<()> {
    let namespaces: Api<Namespace> = Api::all(client.inner().clone());

    ignore_not_found(
        namespaces
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(Into::into),
    )
}

pub(crate) fn namespace_to_info(ns: Namespace) -> NamespaceInfo {
    let metadata = ns.metadata;
    let status = ns.status.and_then(|s| s.phase).unwrap_or_default();

    NamespaceInfo {
        name: metadata.name.unwrap_or_default(),
        status,
        labels: metadata.labels.unwrap_or_default(),
        created_at: metadata.creation_timestamp.map(|t| t.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::NamespaceStatus;

    #[test]
    fn test_namespace_to_info() {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some("billing-svc".into()),
                labels: Some(BTreeMap::from([("kaas.io/managed".into(), "true".into())])),
                ..Default::default()
            },
            status: Some(NamespaceStatus {
                phase: Some("Active".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let info = namespace_to_info(ns);
        assert_eq!(info.name, "billing-svc");
        assert_eq!(info.status, "Active");
        assert_eq!(info.labels["kaas.io/managed"], "true");
        assert!(info.created_at.is_none());
    }
}
