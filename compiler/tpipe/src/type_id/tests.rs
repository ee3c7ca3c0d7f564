use super::*;
use std::collections::hash_map::DefaultHasher;
use tpipe_model::ValueKind;

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn part(n: i64) -> Option<Value> {
    Some(Value::from(n))
}

#[test]
fn test_equal_ids() {
    let ty = RuntimeType::builder("Domain").build();
    let a = AssembledTypeId::new(ty.clone(), [part(1), None]);
    let b = AssembledTypeId::new(ty, [part(1), None]);
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
}

#[test]
fn test_requested_type_matters() {
    let a = AssembledTypeId::new(RuntimeType::builder("A").build(), [part(1)]);
    let b = AssembledTypeId::new(RuntimeType::builder("A").build(), [part(1)]);
    assert_ne!(a, b);
}

#[test]
fn test_null_part_differs_from_value() {
    let ty = RuntimeType::builder("Domain").build();
    let a = AssembledTypeId::new(ty.clone(), [None]);
    let b = AssembledTypeId::new(ty, [part(0)]);
    assert_ne!(a, b);
}

#[test]
fn test_part_lookup() {
    let ty = RuntimeType::builder("Domain").build();
    let id = AssembledTypeId::new(ty.clone(), [None, part(7)]);
    assert_eq!(id.requested_type(), &ty);
    assert_eq!(id.part(0), None);
    assert_eq!(id.part(1), Some(&Value::from(7_i64)));
    assert_eq!(id.part(2), None);
    assert_eq!(id.parts().len(), 2);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "not comparable")]
fn test_comparing_different_configurations_asserts() {
    let ty = RuntimeType::builder("Domain").build();
    let a = AssembledTypeId::new(ty.clone(), [part(1)]);
    let b = AssembledTypeId::new(ty, [part(1), part(2)]);
    let _ = a == b;
}

#[test]
fn test_construction_key() {
    let ty = RuntimeType::builder("Domain").build();
    let id = AssembledTypeId::new(ty, [part(1)]);
    let shape = DelegateShape::new(vec![ValueKind::Int]);
    let a = ConstructionKey::new(id.clone(), shape.clone(), false);
    let b = ConstructionKey::new(id.clone(), shape.clone(), false);
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
    assert_ne!(a, ConstructionKey::new(id.clone(), shape, true));
    assert_ne!(a, ConstructionKey::new(id, DelegateShape::default(), false));
}

#[test]
fn test_debug_lists_parts() {
    let ty = RuntimeType::builder("Domain").namespace("App").build();
    let id = AssembledTypeId::new(ty, [part(3), None]);
    assert_eq!(
        format!("{id:?}"),
        "AssembledTypeId(App.Domain, Int(3), null)"
    );
    assert_eq!(id.to_string(), "App.Domain");
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn parts_strategy(len: usize) -> impl Strategy<Value = Vec<Option<i64>>> {
        proptest::collection::vec(proptest::option::of(0_i64..4), len)
    }

    fn build(ty: &RuntimeType, parts: &[Option<i64>]) -> AssembledTypeId {
        AssembledTypeId::new(ty.clone(), parts.iter().map(|p| p.map(Value::from)))
    }

    proptest! {
        #[test]
        fn equality_follows_parts(a in parts_strategy(3), b in parts_strategy(3)) {
            let ty = RuntimeType::builder("Domain").build();
            let id_a = build(&ty, &a);
            let id_b = build(&ty, &b);
            prop_assert_eq!(id_a == id_b, a == b);
            if a == b {
                prop_assert_eq!(hash_of(&id_a), hash_of(&id_b));
            }
        }

        #[test]
        fn changing_one_part_breaks_equality(parts in parts_strategy(4), slot in 0_usize..4) {
            let ty = RuntimeType::builder("Domain").build();
            let mut changed = parts.clone();
            changed[slot] = match parts[slot] {
                Some(n) => Some(n + 10),
                None => Some(-1),
            };
            prop_assert_ne!(build(&ty, &parts), build(&ty, &changed));
        }
    }
}
