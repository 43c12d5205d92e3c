//! Quell kubehub: adapters that let kube objects flow through the predicates.
//!
//! `ManagedObject` lives in `quell-core`, so kube types are wrapped rather than
//! implemented directly: [`Dynamic`] for `DynamicObject` streams and
//! [`Typed`] for any k8s-openapi or derived resource with a static type.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{DynamicObject, Resource};
use quell_core::{CoreError, Document, GroupVersionKind, ManagedObject, ObjectRef};
use serde::Serialize;

/// Render a GVK as a key, e.g. `v1/ConfigMap` or `apps/v1/Deployment`.
pub fn gvk_key(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        format!("{}/{}", gvk.version, gvk.kind)
    } else {
        format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind)
    }
}

/// Parse a key produced by [`gvk_key`].
pub fn parse_gvk_key(key: &str) -> Result<GroupVersionKind> {
    let parts: Vec<_> = key.split('/').collect();
    match parts.as_slice() {
        [version, kind] if !version.is_empty() && !kind.is_empty() => Ok(GroupVersionKind::new("", *version, *kind)),
        [group, version, kind] if !group.is_empty() && !version.is_empty() && !kind.is_empty() => {
            Ok(GroupVersionKind::new(*group, *version, *kind))
        }
        _ => Err(anyhow!("invalid gvk key: {} (expect v1/Kind or group/v1/Kind)", key)),
    }
}

pub fn to_kube_gvk(gvk: &GroupVersionKind) -> kube::core::GroupVersionKind {
    kube::core::GroupVersionKind::gvk(&gvk.group, &gvk.version, &gvk.kind)
}

pub fn from_kube_gvk(gvk: &kube::core::GroupVersionKind) -> GroupVersionKind {
    GroupVersionKind::new(gvk.group.as_str(), gvk.version.as_str(), gvk.kind.as_str())
}

fn object_ref_from(meta: &ObjectMeta, gvk: GroupVersionKind) -> ObjectRef {
    ObjectRef { name: meta.name.clone().unwrap_or_default(), namespace: meta.namespace.clone(), gvk }
}

fn serialize<T: Serialize>(obj: &T) -> Result<Document, CoreError> {
    Ok(Document::new(serde_json::to_value(obj)?))
}

/// `DynamicObject` as seen by the predicates. Type information comes from the
/// object's own `apiVersion`/`kind`.
#[derive(Debug, Clone)]
pub struct Dynamic(pub DynamicObject);

impl Dynamic {
    pub fn into_inner(self) -> DynamicObject { self.0 }
}

impl From<DynamicObject> for Dynamic {
    fn from(obj: DynamicObject) -> Self { Self(obj) }
}

impl ManagedObject for Dynamic {
    fn object_ref(&self) -> ObjectRef {
        let gvk = match &self.0.types {
            Some(t) => GroupVersionKind::from_api_version(&t.api_version, &t.kind),
            None => GroupVersionKind::default(),
        };
        object_ref_from(&self.0.metadata, gvk)
    }

    fn to_document(&self) -> Result<Document, CoreError> { serialize(&self.0) }

    fn generation(&self) -> Option<i64> { self.0.metadata.generation }
}

/// Statically typed resource (ConfigMap, Deployment, a derived CRD, ...).
#[derive(Debug, Clone)]
pub struct Typed<K>(pub K);

impl<K> Typed<K> {
    pub fn into_inner(self) -> K { self.0 }
}

impl<K> From<K> for Typed<K>
where
    K: Resource<DynamicType = ()>,
{
    fn from(obj: K) -> Self { Self(obj) }
}

impl<K> ManagedObject for Typed<K>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    fn object_ref(&self) -> ObjectRef {
        let gvk = GroupVersionKind::new(K::group(&()), K::version(&()), K::kind(&()));
        object_ref_from(self.0.meta(), gvk)
    }

    fn to_document(&self) -> Result<Document, CoreError> { serialize(&self.0) }

    fn generation(&self) -> Option<i64> { self.0.meta().generation }
}
