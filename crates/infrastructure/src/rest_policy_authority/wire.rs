//! JSON wire model of the authority's public v2 API.

use std::collections::BTreeMap;
use std::str::FromStr;

use lakewarden_core::{AppError, AppResult};
use lakewarden_domain::{
    AccessKind, MaskKind, PolicyDocument, PolicyKind, PrincipalSet, ResourceSelector,
    RoleDocument, RuleItem, RulePayload,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WirePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub service: String,
    pub name: String,
    pub policy_type: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resources: BTreeMap<String, WireResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_items: Vec<WireAccessItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_mask_policy_items: Vec<WireMaskItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_filter_policy_items: Vec<WireFilterItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireResource {
    pub values: Vec<String>,
    pub is_excludes: bool,
    pub is_recursive: bool,
}

impl WireResource {
    fn single(value: impl Into<String>) -> Self {
        Self {
            values: vec![value.into()],
            is_excludes: false,
            is_recursive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireAccess {
    #[serde(rename = "type")]
    pub access_type: String,
    pub is_allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct WireAccessItem {
    #[serde(default)]
    pub accesses: Vec<WireAccess>,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireMaskInfo {
    pub data_mask_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_expr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireMaskItem {
    #[serde(flatten)]
    pub base: WireAccessItem,
    pub data_mask_info: WireMaskInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireFilterInfo {
    pub filter_expr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireFilterItem {
    #[serde(flatten)]
    pub base: WireAccessItem,
    pub row_filter_info: WireFilterInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireRoleMember {
    pub name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct WireRole {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub users: Vec<WireRoleMember>,
    #[serde(default)]
    pub groups: Vec<WireRoleMember>,
    #[serde(default)]
    pub roles: Vec<WireRoleMember>,
}

/// Encodes an access token with the casing the service expects.
fn encode_access(access: AccessKind, uppercase: bool) -> WireAccess {
    let token = if uppercase {
        access.as_str().to_ascii_uppercase()
    } else {
        access.as_str().to_owned()
    };
    WireAccess {
        access_type: token,
        is_allowed: true,
    }
}

fn encode_item(item: &RuleItem, uppercase: bool) -> WireAccessItem {
    WireAccessItem {
        accesses: item
            .accesses
            .iter()
            .map(|access| encode_access(*access, uppercase))
            .collect(),
        users: item.members.users.iter().cloned().collect(),
        groups: item.members.groups.iter().cloned().collect(),
        roles: item.members.roles.iter().cloned().collect(),
    }
}

fn decode_item(item: &WireAccessItem, payload: RulePayload) -> AppResult<RuleItem> {
    let mut accesses = std::collections::BTreeSet::new();
    for access in &item.accesses {
        let parsed = AccessKind::from_str(&access.access_type).map_err(|_| {
            AppError::Internal(format!(
                "authority returned unknown access token '{}'",
                access.access_type
            ))
        })?;
        accesses.insert(parsed);
    }

    Ok(RuleItem {
        accesses,
        members: PrincipalSet {
            users: item.users.iter().cloned().collect(),
            groups: item.groups.iter().cloned().collect(),
            roles: item.roles.iter().cloned().collect(),
        },
        payload,
    })
}

pub(super) fn encode_policy(document: &PolicyDocument) -> WirePolicy {
    let uppercase = document.resource.catalog.is_some();

    let mut resources = BTreeMap::new();
    resources.insert(
        "database".to_owned(),
        WireResource::single(document.resource.database.clone()),
    );
    resources.insert(
        "table".to_owned(),
        WireResource::single(document.resource.table.clone()),
    );
    if let Some(column) = &document.resource.column {
        resources.insert("column".to_owned(), WireResource::single(column.clone()));
    }
    if let Some(catalog) = &document.resource.catalog {
        resources.insert("catalog".to_owned(), WireResource::single(catalog.clone()));
    }

    let mut wire = WirePolicy {
        id: document.id,
        service: document.service.clone(),
        name: document.name.clone(),
        policy_type: document.kind.wire_type(),
        description: document.description.clone(),
        resources,
        policy_items: Vec::new(),
        data_mask_policy_items: Vec::new(),
        row_filter_policy_items: Vec::new(),
    };

    for item in &document.items {
        match &item.payload {
            RulePayload::Access => wire.policy_items.push(encode_item(item, uppercase)),
            RulePayload::Mask { mask, value_expr } => wire.data_mask_policy_items.push(WireMaskItem {
                base: encode_item(item, uppercase),
                data_mask_info: WireMaskInfo {
                    data_mask_type: mask.as_str().to_owned(),
                    value_expr: value_expr.clone(),
                    mask_condition: None,
                    description: None,
                },
            }),
            RulePayload::RowFilter { expr } => wire.row_filter_policy_items.push(WireFilterItem {
                base: encode_item(item, uppercase),
                row_filter_info: WireFilterInfo {
                    filter_expr: expr.clone(),
                },
            }),
        }
    }

    wire
}

pub(super) fn decode_policy(wire: WirePolicy) -> AppResult<PolicyDocument> {
    let kind = PolicyKind::from_wire_type(wire.policy_type)?;

    let first_value = |key: &str| -> Option<String> {
        wire.resources
            .get(key)
            .and_then(|resource| resource.values.first().cloned())
    };
    let resource = ResourceSelector {
        database: first_value("database").unwrap_or_default(),
        table: first_value("table").unwrap_or_default(),
        column: first_value("column"),
        catalog: first_value("catalog"),
    };

    let mut items = Vec::new();
    match kind {
        PolicyKind::Access => {
            for item in &wire.policy_items {
                items.push(decode_item(item, RulePayload::Access)?);
            }
        }
        PolicyKind::Mask => {
            for item in &wire.data_mask_policy_items {
                let mask = MaskKind::from_str(&item.data_mask_info.data_mask_type)
                    .map_err(|error| AppError::Internal(error.to_string()))?;
                items.push(decode_item(
                    &item.base,
                    RulePayload::Mask {
                        mask,
                        value_expr: item.data_mask_info.value_expr.clone(),
                    },
                )?);
            }
        }
        PolicyKind::RowFilter => {
            for item in &wire.row_filter_policy_items {
                items.push(decode_item(
                    &item.base,
                    RulePayload::RowFilter {
                        expr: item.row_filter_info.filter_expr.clone(),
                    },
                )?);
            }
        }
    }

    Ok(PolicyDocument {
        id: wire.id,
        service: wire.service,
        name: wire.name,
        kind,
        resource,
        items,
        description: wire.description,
    })
}

pub(super) fn encode_role(document: &RoleDocument) -> WireRole {
    let member = |name: &String| WireRoleMember {
        name: name.clone(),
        is_admin: false,
    };

    WireRole {
        id: document.id,
        name: document.name.clone(),
        users: document.members.users.iter().map(member).collect(),
        groups: document.members.groups.iter().map(member).collect(),
        roles: document.members.roles.iter().map(member).collect(),
    }
}

pub(super) fn decode_role(wire: WireRole) -> RoleDocument {
    RoleDocument {
        id: wire.id,
        name: wire.name,
        members: PrincipalSet {
            users: wire.users.into_iter().map(|member| member.name).collect(),
            groups: wire.groups.into_iter().map(|member| member.name).collect(),
            roles: wire.roles.into_iter().map(|member| member.name).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use lakewarden_domain::{
        AccessKind, MaskKind, PolicyDocument, PolicyKind, PrincipalSet, ResourceSelector,
        RuleItem, RulePayload,
    };

    use super::{decode_policy, encode_policy};

    fn mask_document(catalog: Option<&str>) -> PolicyDocument {
        PolicyDocument {
            id: Some(12),
            service: "lake_olap".to_owned(),
            name: "sales.customers.phone.mask".to_owned(),
            kind: PolicyKind::Mask,
            resource: ResourceSelector {
                database: "sales".to_owned(),
                table: "customers".to_owned(),
                column: Some("phone".to_owned()),
                catalog: catalog.map(ToOwned::to_owned),
            },
            items: vec![RuleItem {
                accesses: BTreeSet::from([AccessKind::Select]),
                members: PrincipalSet::user("alice"),
                payload: RulePayload::Mask {
                    mask: MaskKind::Hash,
                    value_expr: None,
                },
            }],
            description: None,
        }
    }

    #[test]
    fn policy_roundtrips_through_the_wire_model() {
        let document = mask_document(None);
        let decoded = decode_policy(encode_policy(&document));
        assert_eq!(decoded.ok(), Some(document));
    }

    #[test]
    fn catalog_targets_uppercase_access_tokens() {
        let wire = encode_policy(&mask_document(Some("internal")));
        assert_eq!(
            wire.data_mask_policy_items[0].base.accesses[0].access_type,
            "SELECT"
        );

        let plain = encode_policy(&mask_document(None));
        assert_eq!(
            plain.data_mask_policy_items[0].base.accesses[0].access_type,
            "select"
        );
    }

    #[test]
    fn wire_json_uses_the_authority_field_names() {
        let wire = encode_policy(&mask_document(Some("internal")));
        let value = match serde_json::to_value(&wire) {
            Ok(value) => value,
            Err(error) => panic!("serialization failed: {error}"),
        };

        assert_eq!(value["policyType"], 1);
        assert!(value["dataMaskPolicyItems"][0]["dataMaskInfo"]["dataMaskType"] == "MASK_HASH");
        assert_eq!(value["resources"]["catalog"]["values"][0], "internal");
        assert_eq!(value["resources"]["database"]["isExcludes"], false);
    }
}
