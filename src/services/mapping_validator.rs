//! Mapping coverage validator.
//!
//! Compares an agent's submitted field mapping entries against the members
//! an entity schema actually has. The required member set is:
//!
//! - the primary field, as a non-nullable scalar
//! - every plain field, as a scalar with the field's nullability
//! - every belongs-to relation, with the relation's nullability
//! - every reverse relation discovered in the catalog: `hasOne` (always
//!   nullable) when the child's foreign key is unique, otherwise `hasMany`
//!   (no nullability)
//!
//! Foreign key columns are part of their belongs-to relation and are not
//! members of their own.

use serde::Serialize;
use std::fmt;

use crate::domain::models::{EntitySchema, FieldMappingEntry, MappingKind, SchemaCatalog, ValidationIssue};

/// A member every mapping of a schema must document exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredMember {
    pub name: String,
    pub kind: MappingKind,
    pub nullable: Option<bool>,
}

/// Derive the required member set of `schema`.
pub fn required_members(schema: &EntitySchema, catalog: &SchemaCatalog) -> Vec<RequiredMember> {
    let mut members = vec![RequiredMember {
        name: schema.primary.name.clone(),
        kind: MappingKind::Scalar,
        nullable: Some(false),
    }];

    members.extend(schema.plain_fields.iter().map(|field| RequiredMember {
        name: field.name.clone(),
        kind: MappingKind::Scalar,
        nullable: Some(field.nullable),
    }));

    members.extend(schema.belongs_to.iter().map(|rel| RequiredMember {
        name: rel.name.clone(),
        kind: MappingKind::BelongsTo,
        nullable: Some(rel.nullable),
    }));

    members.extend(catalog.reverse_relations(&schema.name).into_iter().map(|rev| {
        if rev.unique {
            RequiredMember {
                name: rev.name,
                kind: MappingKind::HasOne,
                nullable: Some(true),
            }
        } else {
            RequiredMember {
                name: rev.name,
                kind: MappingKind::HasMany,
                nullable: None,
            }
        }
    }));

    members
}

/// One coverage problem in a submitted mapping set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingIssue {
    UnknownMember {
        index: usize,
        member: String,
        valid: Vec<String>,
    },
    KindMismatch {
        index: usize,
        member: String,
        expected: MappingKind,
        received: MappingKind,
    },
    NullableMismatch {
        index: usize,
        member: String,
        expected: Option<bool>,
        received: Option<bool>,
    },
    MissingMember {
        member: String,
        kind: MappingKind,
        nullable: Option<bool>,
    },
    DuplicateMember {
        index: usize,
        member: String,
    },
}

fn nullable_str(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "true",
        Some(false) => "false",
        None => "null",
    }
}

impl MappingIssue {
    pub fn member(&self) -> &str {
        match self {
            Self::UnknownMember { member, .. }
            | Self::KindMismatch { member, .. }
            | Self::NullableMismatch { member, .. }
            | Self::MissingMember { member, .. }
            | Self::DuplicateMember { member, .. } => member,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::MissingMember { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::UnknownMember { .. })
    }

    /// Convert into feedback for the field holding the mappings, e.g. `$input.mappings`.
    pub fn to_validation_issue(&self, field: &str) -> ValidationIssue {
        match self {
            Self::UnknownMember { index, member, valid } => ValidationIssue::new(
                format!("{field}[{index}].member"),
                format!("one of [{}]", valid.join(", ")),
                format!("unknown member: {member}"),
            ),
            Self::KindMismatch {
                index,
                member,
                expected,
                received,
            } => ValidationIssue::new(
                format!("{field}[{index}].kind"),
                format!("\"{expected}\""),
                format!("kind mismatch for {member}: expected \"{expected}\", received \"{received}\""),
            ),
            Self::NullableMismatch {
                index,
                member,
                expected,
                received,
            } => ValidationIssue::new(
                format!("{field}[{index}].nullable"),
                nullable_str(*expected),
                format!(
                    "nullable mismatch for {member}: expected {}, received {}",
                    nullable_str(*expected),
                    nullable_str(*received)
                ),
            ),
            Self::MissingMember { member, kind, nullable } => ValidationIssue::new(
                field,
                format!(
                    "{{ member: \"{member}\", kind: \"{kind}\", nullable: {} }}",
                    nullable_str(*nullable)
                ),
                format!("missing member: {member}"),
            ),
            Self::DuplicateMember { index, member } => ValidationIssue::new(
                format!("{field}[{index}].member"),
                "each member exactly once",
                format!("duplicate member: {member}"),
            ),
        }
    }
}

impl fmt::Display for MappingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_validation_issue("mappings").description)
    }
}

/// Validate a submitted mapping set against the schema's required members.
///
/// Issues are returned in submission order, followed by missing members in
/// required-member order.
pub fn validate(schema: &EntitySchema, catalog: &SchemaCatalog, mappings: &[FieldMappingEntry]) -> Vec<MappingIssue> {
    let required = required_members(schema, catalog);
    // Two relations can share a name, so each required entry is consumed once.
    let mut consumed = vec![false; required.len()];
    let mut issues = Vec::new();

    for (index, entry) in mappings.iter().enumerate() {
        let mut same_name = required
            .iter()
            .enumerate()
            .filter(|(_, m)| m.name == entry.member)
            .peekable();
        if same_name.peek().is_none() {
            issues.push(MappingIssue::UnknownMember {
                index,
                member: entry.member.clone(),
                valid: required.iter().map(|m| m.name.clone()).collect(),
            });
            continue;
        }
        let Some((slot, expected)) = same_name.find(|(i, _)| !consumed[*i]) else {
            issues.push(MappingIssue::DuplicateMember {
                index,
                member: entry.member.clone(),
            });
            continue;
        };
        consumed[slot] = true;

        if entry.kind != expected.kind {
            issues.push(MappingIssue::KindMismatch {
                index,
                member: entry.member.clone(),
                expected: expected.kind,
                received: entry.kind,
            });
        }
        if entry.nullable != expected.nullable {
            issues.push(MappingIssue::NullableMismatch {
                index,
                member: entry.member.clone(),
                expected: expected.nullable,
                received: entry.nullable,
            });
        }
    }

    for (member, _) in required.iter().zip(&consumed).filter(|(_, done)| !**done) {
        issues.push(MappingIssue::MissingMember {
            member: member.name.clone(),
            kind: member.kind,
            nullable: member.nullable,
        });
    }

    issues
}

/// Validate and convert straight into agent feedback.
pub fn validate_as_issues(
    schema: &EntitySchema,
    catalog: &SchemaCatalog,
    mappings: &[FieldMappingEntry],
    field: &str,
) -> Vec<ValidationIssue> {
    validate(schema, catalog, mappings)
        .iter()
        .map(|issue| issue.to_validation_issue(field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(vec![
            EntitySchema::new("order")
                .with_field("total", "double", false)
                .with_belongs_to("customer", "customer", false, "orders"),
            EntitySchema::new("order_item")
                .with_field("quantity", "int", false)
                .with_belongs_to("order", "order", false, "items"),
            EntitySchema::new("customer").with_field("nickname", "varchar", true),
            EntitySchema::new("customer_profile")
                .with_belongs_to("customer", "customer", false, "profile")
                .unique(),
        ])
    }

    fn complete_order_mapping() -> Vec<FieldMappingEntry> {
        vec![
            FieldMappingEntry::new("id", MappingKind::Scalar, Some(false)),
            FieldMappingEntry::new("total", MappingKind::Scalar, Some(false)),
            FieldMappingEntry::new("customer", MappingKind::BelongsTo, Some(false)),
            FieldMappingEntry::new("items", MappingKind::HasMany, None),
        ]
    }

    #[test]
    fn test_required_members_of_order() {
        let catalog = catalog();
        let members = required_members(catalog.get("order").unwrap(), &catalog);
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["id", "total", "customer", "items"]);
        assert_eq!(members[3].kind, MappingKind::HasMany);
        assert_eq!(members[3].nullable, None);
    }

    #[test]
    fn test_unique_reverse_relation_is_nullable_has_one() {
        let catalog = catalog();
        let members = required_members(catalog.get("customer").unwrap(), &catalog);
        let profile = members.iter().find(|m| m.name == "profile").unwrap();
        assert_eq!(profile.kind, MappingKind::HasOne);
        assert_eq!(profile.nullable, Some(true));
        let orders = members.iter().find(|m| m.name == "orders").unwrap();
        assert_eq!(orders.kind, MappingKind::HasMany);
    }

    #[test]
    fn test_complete_mapping_has_no_issues() {
        let catalog = catalog();
        let issues = validate(catalog.get("order").unwrap(), &catalog, &complete_order_mapping());
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_omitting_reverse_relation_reports_exactly_one_missing_member() {
        let catalog = catalog();
        let mut mappings = complete_order_mapping();
        mappings.retain(|m| m.member != "items");

        let issues = validate(catalog.get("order").unwrap(), &catalog, &mappings);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "missing member: items");
    }

    #[test]
    fn test_scalar_declared_as_belongs_to_is_kind_mismatch() {
        let catalog = catalog();
        let mut mappings = complete_order_mapping();
        mappings[1] = FieldMappingEntry::new("total", MappingKind::BelongsTo, Some(false));

        let issues = validate(catalog.get("order").unwrap(), &catalog, &mappings);
        assert_eq!(
            issues,
            vec![MappingIssue::KindMismatch {
                index: 1,
                member: "total".to_string(),
                expected: MappingKind::Scalar,
                received: MappingKind::BelongsTo,
            }]
        );
        let feedback = issues[0].to_validation_issue("$input.mappings");
        assert_eq!(feedback.expected, "\"scalar\"");
        assert!(feedback.description.contains("received \"belongsTo\""));
    }

    #[test]
    fn test_unknown_member_lists_valid_members() {
        let catalog = catalog();
        let mut mappings = complete_order_mapping();
        mappings.push(FieldMappingEntry::new("customer_id", MappingKind::Scalar, Some(false)));

        let issues = validate(catalog.get("order").unwrap(), &catalog, &mappings);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_unknown());
        let feedback = issues[0].to_validation_issue("$input.mappings");
        assert_eq!(feedback.path, "$input.mappings[4].member");
        assert_eq!(feedback.expected, "one of [id, total, customer, items]");
    }

    #[test]
    fn test_nullable_mismatch_and_duplicate() {
        let catalog = catalog();
        let mut mappings = complete_order_mapping();
        mappings[3] = FieldMappingEntry::new("items", MappingKind::HasMany, Some(false));
        mappings.push(FieldMappingEntry::new("id", MappingKind::Scalar, Some(false)));

        let issues = validate(catalog.get("order").unwrap(), &catalog, &mappings);
        assert_eq!(issues.len(), 2);
        assert!(matches!(
            &issues[0],
            MappingIssue::NullableMismatch { expected: None, received: Some(false), .. }
        ));
        assert!(matches!(&issues[1], MappingIssue::DuplicateMember { index: 4, .. }));
    }

    #[test]
    fn test_shared_reverse_name_must_be_mapped_twice() {
        let catalog = SchemaCatalog::new(vec![
            EntitySchema::new("order"),
            EntitySchema::new("order_item").with_belongs_to("order", "order", false, "items"),
            EntitySchema::new("order_gift").with_belongs_to("order", "order", false, "items"),
        ]);
        let order = catalog.get("order").unwrap();
        assert_eq!(required_members(order, &catalog).len(), 3);

        let once = vec![
            FieldMappingEntry::new("id", MappingKind::Scalar, Some(false)),
            FieldMappingEntry::new("items", MappingKind::HasMany, None),
        ];
        let issues = validate(order, &catalog, &once);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "missing member: items");

        let mut twice = once.clone();
        twice.push(FieldMappingEntry::new("items", MappingKind::HasMany, None));
        assert!(validate(order, &catalog, &twice).is_empty());

        twice.push(FieldMappingEntry::new("items", MappingKind::HasMany, None));
        let issues = validate(order, &catalog, &twice);
        assert!(matches!(&issues[..], [MappingIssue::DuplicateMember { index: 3, .. }]));
    }
}
