use mapsmith::domain::models::{EntitySchema, FieldMappingEntry, MappingKind, SchemaCatalog};
use mapsmith::services::mapping_validator::{required_members, validate};
use mapsmith::services::MappingIssue;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn catalog(fields: &BTreeMap<String, bool>, children: usize) -> SchemaCatalog {
    let mut schemas = Vec::new();
    let mut parent = EntitySchema::new("parent").with_belongs_to("owner", "owner", true, "parents");
    for (name, nullable) in fields {
        parent = parent.with_field(format!("f_{name}"), "string", *nullable);
    }
    schemas.push(parent);
    schemas.push(EntitySchema::new("owner"));
    for i in 0..children {
        schemas.push(EntitySchema::new(format!("child_{i}")).with_belongs_to("parent", "parent", false, format!("children_{i}")));
    }
    SchemaCatalog::new(schemas)
}

fn exact_entries(catalog: &SchemaCatalog) -> Vec<FieldMappingEntry> {
    required_members(catalog.get("parent").unwrap(), catalog)
        .into_iter()
        .map(|m| FieldMappingEntry::new(m.name, m.kind, m.nullable))
        .collect()
}

proptest! {
    /// Property: the required member set itself always validates
    #[test]
    fn prop_required_members_validate(
        fields in prop::collection::btree_map("[a-z]{3,8}", any::<bool>(), 0..8),
        children in 0usize..4
    ) {
        let catalog = catalog(&fields, children);
        let schema = catalog.get("parent").unwrap();
        let entries = exact_entries(&catalog);

        prop_assert_eq!(entries.len(), 2 + fields.len() + children);
        prop_assert!(validate(schema, &catalog, &entries).is_empty());
    }

    /// Property: dropping any one member yields exactly that missing member
    #[test]
    fn prop_dropped_member_is_reported_missing(
        fields in prop::collection::btree_map("[a-z]{3,8}", any::<bool>(), 1..8),
        children in 0usize..3,
        pick in any::<prop::sample::Index>()
    ) {
        let catalog = catalog(&fields, children);
        let schema = catalog.get("parent").unwrap();
        let mut entries = exact_entries(&catalog);
        let removed = entries.remove(pick.index(entries.len()));

        let issues = validate(schema, &catalog, &entries);
        prop_assert_eq!(issues.len(), 1);
        prop_assert!(issues[0].is_missing());
        prop_assert_eq!(issues[0].member(), removed.member.as_str());
    }

    /// Property: submission order never matters
    #[test]
    fn prop_order_is_irrelevant(
        fields in prop::collection::btree_map("[a-z]{3,8}", any::<bool>(), 0..8),
        children in 0usize..3,
        seed in any::<u64>()
    ) {
        let catalog = catalog(&fields, children);
        let schema = catalog.get("parent").unwrap();
        let mut entries = exact_entries(&catalog);
        let len = entries.len();
        for i in 0..len {
            let j = (seed.wrapping_mul(i as u64 + 1) % len as u64) as usize;
            entries.swap(i, j);
        }

        prop_assert!(validate(schema, &catalog, &entries).is_empty());
    }

    /// Property: a wrong kind on a scalar is always a kind mismatch
    #[test]
    fn prop_wrong_kind_is_mismatch(
        fields in prop::collection::btree_map("[a-z]{3,8}", any::<bool>(), 1..8),
        pick in any::<prop::sample::Index>()
    ) {
        let catalog = catalog(&fields, 0);
        let schema = catalog.get("parent").unwrap();
        let mut entries = exact_entries(&catalog);
        let scalars: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind == MappingKind::Scalar)
            .map(|(i, _)| i)
            .collect();
        let index = scalars[pick.index(scalars.len())];
        entries[index].kind = MappingKind::HasOne;

        let issues = validate(schema, &catalog, &entries);
        prop_assert_eq!(issues.len(), 1);
        let is_mismatch = matches!(
            &issues[0],
            MappingIssue::KindMismatch { expected: MappingKind::Scalar, received: MappingKind::HasOne, .. }
        );
        prop_assert!(is_mismatch);
    }
}
