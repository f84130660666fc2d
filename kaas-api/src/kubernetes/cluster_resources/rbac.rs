//! Member access bindings
//!
//! Each project member gets one RoleBinding named `user-{user_id}` in the
//! project namespace, pointing at the built-in ClusterRole for their role.

use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef as K8sRoleRef, Subject as K8sSubject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};

use kaas_common::ProjectRole;

use crate::kubernetes::client::K8sClient;
use crate::kubernetes::error::{ignore_not_found, K8sResult};
use crate::kubernetes::types::{binding_name, LABEL_MANAGED};

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

fn role_ref(role: ProjectRole) -> K8sRoleRef {
    K8sRoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: "ClusterRole".to_string(),
        name: role.cluster_role().to_string(),
    }
}

fn user_subject(user_id: &str) -> K8sSubject {
    K8sSubject {
        api_group: Some(RBAC_API_GROUP.to_string()),
        kind: "User".to_string(),
        name: user_id.to_string(),
        namespace: None,
    }
}

pub(crate) fn build_binding(namespace: &str, user_id: &str, role: ProjectRole) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(binding_name(user_id)),
            namespace: Some(namespace.to_string()),
            labels: Some([(LABEL_MANAGED.to_string(), "true".to_string())].into()),
            ..Default::default()
        },
        role_ref: role_ref(role),
        subjects: Some(vec![user_subject(user_id)]),
    }
}

/// Grant `role` to a user in `namespace`
///
/// The role reference of a binding cannot be changed in place, so a role
/// change deletes the binding and creates it again.
pub async fn apply_rbac(
    client: &K8sClient,
    namespace: &str,
    user_id: &str,
    role: ProjectRole,
) -> K8sResult<()> {
    let bindings: Api<RoleBinding> = Api::namespaced(client.inner().clone(), namespace);
    let name = binding_name(user_id);
    let desired = build_binding(namespace, user_id, role);

    match bindings.get_opt(&name).await? {
        Some(mut existing) if existing.role_ref == desired.role_ref => {
            existing.subjects = desired.subjects;
            bindings.replace(&name, &PostParams::default(), &existing).await?;
        }
        Some(existing) => {
            tracing::debug!(
                namespace,
                binding = %name,
                from = %existing.role_ref.name,
                to = %desired.role_ref.name,
                "Recreating binding for role change"
            );
            ignore_not_found(
                bindings
                    .delete(&name, &DeleteParams::default())
                    .await
                    .map(|_| ())
                    .map_err(Into::into),
            )?;
            bindings.create(&PostParams::default(), &desired).await?;
        }
        None => {
            bindings.create(&PostParams::default(), &desired).await?;
        }
    }

    Ok(())
}

/// Revoke a user's binding; an absent binding counts as revoked
pub async fn remove_rbac(client: &K8sClient, namespace: &str, user_id: &str) -> K8sResult<()> {
    let bindings: Api<RoleBinding> = Api::namespaced(client.inner().clone(), namespace);

    ignore_not_found(
        bindings
            .delete(&binding_name(user_id), &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(Into::into),
    )
}
