//! Hierarchical namespace anchors
//!
//! A sub-project namespace is tied to its parent by a `SubnamespaceAnchor`
//! created in the parent namespace and named after the child.

use kube::api::{Api, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};

use crate::kubernetes::client::K8sClient;
use crate::kubernetes::error::K8sResult;
use crate::kubernetes::types::LABEL_MANAGED;

const HNC_GROUP: &str = "hnc.x-k8s.io";
const HNC_VERSION: &str = "v1alpha2";
const ANCHOR_KIND: &str = "SubnamespaceAnchor";
const ANCHOR_PLURAL: &str = "subnamespaceanchors";

pub(crate) fn anchor_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(HNC_GROUP, HNC_VERSION, ANCHOR_KIND);
    ApiResource::from_gvk_with_plural(&gvk, ANCHOR_PLURAL)
}

pub(crate) fn build_anchor(parent_namespace: &str, child_namespace: &str) -> DynamicObject {
    let mut anchor = DynamicObject::new(child_namespace, &anchor_resource()).within(parent_namespace);
    anchor.metadata.labels = Some([(LABEL_MANAGED.to_string(), "true".to_string())].into());
    anchor
}

/// Anchor `child_namespace` under `parent_namespace`; an existing anchor counts as success
pub async fn configure_hnc(client: &K8sClient, parent_namespace: &str, child_namespace: &str) -> K8sResult<()> {
    let anchors: Api<DynamicObject> =
        Api::namespaced_with(client.inner().clone(), parent_namespace, &anchor_resource());

    match anchors
        .create(&PostParams::default(), &build_anchor(parent_namespace, child_namespace))
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            tracing::debug!(
                parent = parent_namespace,
                child = child_namespace,
                "Hierarchy anchor already exists"
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
