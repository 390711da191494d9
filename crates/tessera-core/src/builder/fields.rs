use crate::builder::error::BuildError;

/// Tracks which of up to 64 named fields have been set.
#[derive(Debug, Clone, Copy)]
pub struct FieldSet {
    builder: &'static str,
    names: &'static [&'static str],
    set: u64,
}

impl FieldSet {
    pub const fn new(builder: &'static str, names: &'static [&'static str]) -> Self {
        assert!(names.len() <= 64);
        FieldSet {
            builder,
            names,
            set: 0,
        }
    }

    pub fn builder(&self) -> &'static str {
        self.builder
    }

    fn index_of(&self, field: &str) -> Option<usize> {
        self.names.iter().position(|name| *name == field)
    }

    /// Mark `field` as set, returning its canonical static name.
    pub fn mark(&mut self, field: &str) -> Result<&'static str, BuildError> {
        let index = self.index_of(field).ok_or_else(|| BuildError::UnknownField {
            builder: self.builder,
            field: field.to_string(),
        })?;
        let bit = 1u64 << index;
        if self.set & bit != 0 {
            return Err(BuildError::DuplicateField {
                builder: self.builder,
                field: self.names[index],
            });
        }
        self.set |= bit;
        Ok(self.names[index])
    }

    pub fn is_set(&self, field: &str) -> bool {
        self.index_of(field)
            .is_some_and(|index| self.set & (1u64 << index) != 0)
    }

    /// Names of unset fields, in declaration order
    pub fn unset(&self) -> Vec<&'static str> {
        self.names
            .iter()
            .enumerate()
            .filter(|(index, _)| self.set & (1u64 << index) == 0)
            .map(|(_, name)| *name)
            .collect()
    }

    pub fn ensure_complete(&self) -> Result<(), BuildError> {
        let unset = self.unset();
        if unset.is_empty() {
            Ok(())
        } else {
            Err(BuildError::UnsetFields {
                builder: self.builder,
                fields: unset,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &["sender", "message", "fee"];

    #[test]
    fn test_mark_and_duplicate() {
        let mut fields = FieldSet::new("Transfer<Message>", NAMES);
        assert_eq!(fields.mark("sender").unwrap(), "sender");
        assert!(fields.is_set("sender"));
        assert_eq!(
            fields.mark("sender"),
            Err(BuildError::DuplicateField {
                builder: "Transfer<Message>",
                field: "sender",
            })
        );
    }

    #[test]
    fn test_unset_lists_all_missing_in_order() {
        let mut fields = FieldSet::new("Transfer<Message>", NAMES);
        fields.mark("message").unwrap();
        assert_eq!(
            fields.ensure_complete(),
            Err(BuildError::UnsetFields {
                builder: "Transfer<Message>",
                fields: vec!["sender", "fee"],
            })
        );
    }

    #[test]
    fn test_unknown_field() {
        let mut fields = FieldSet::new("Transfer<Message>", NAMES);
        assert!(matches!(
            fields.mark("colour"),
            Err(BuildError::UnknownField { .. })
        ));
    }
}
