use crate::types::Exp;

/// When a storage reference is evaluated. References in preconditions and
/// case guards are `Neither` (untimed); references in postconditions and
/// update right-hand sides are `Pre` or `Post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    Pre,
    Post,
    Neither,
}

impl std::fmt::Display for Timing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timing::Pre => write!(f, "Pre"),
            Timing::Post => write!(f, "Post"),
            Timing::Neither => write!(f, "Neither"),
        }
    }
}

/// Rewrite every `Neither` storage reference in `e` (including mapping
/// index sub-expressions) to the given timing. `Pre` and `Post` references
/// are left as written.
pub fn set_time(e: &Exp, t: Timing) -> Exp {
    e.map_entries(&|timing, item| {
        let timing = if timing == Timing::Neither { t } else { timing };
        Exp::TEntry(timing, item.map_indices(&|ix| set_time(ix, t)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageItem, StorageRef};
    use crate::traversal;
    use act_dsl::ast::{AbiType, Span};

    fn item(name: &str) -> StorageItem {
        StorageItem {
            ty: crate::types::ActType::Integer,
            abi: AbiType::UInt(256),
            reference: StorageRef::Var {
                contract: "C".into(),
                name: name.into(),
                span: Span::new(0, 0),
            },
        }
    }

    #[test]
    fn neither_entries_are_retimed() {
        let e = Exp::add(
            Exp::TEntry(Timing::Neither, item("x")),
            Exp::TEntry(Timing::Pre, item("y")),
        );
        let post = set_time(&e, Timing::Post);
        let timings: Vec<Timing> = traversal::entries(&post).iter().map(|(t, _)| *t).collect();
        assert_eq!(timings, vec![Timing::Post, Timing::Pre]);
    }

    #[test]
    fn set_time_reaches_mapping_indices() {
        let inner = Exp::TEntry(Timing::Neither, item("k"));
        let mapped = StorageItem {
            ty: crate::types::ActType::Integer,
            abi: AbiType::UInt(256),
            reference: StorageRef::Mapping {
                base: Box::new(StorageRef::Var {
                    contract: "C".into(),
                    name: "m".into(),
                    span: Span::new(0, 0),
                }),
                indices: vec![inner],
                span: Span::new(0, 0),
            },
        };
        let e = Exp::TEntry(Timing::Neither, mapped);
        let timed = set_time(&e, Timing::Pre);
        let all = traversal::entries(&timed);
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|(t, _)| *t == Timing::Pre));
    }
}
