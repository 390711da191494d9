use crate::builder::error::BuildError;
use crate::builder::fields::FieldSet;
use crate::types::Asset;

const BUILDER: &str = "Asset";
const FIELDS: &[&str] = &["asset_id", "domain_id", "precision"];

#[derive(Debug, Clone)]
pub struct AssetBuilder {
    fields: FieldSet,
    asset_id: String,
    domain_id: String,
    precision: u8,
}

impl Default for AssetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetBuilder {
    pub fn new() -> Self {
        AssetBuilder {
            fields: FieldSet::new(BUILDER, FIELDS),
            asset_id: String::new(),
            domain_id: String::new(),
            precision: 0,
        }
    }

    pub fn asset_id(&mut self, asset_id: impl Into<String>) -> Result<&mut Self, BuildError> {
        self.fields.mark("asset_id")?;
        self.asset_id = asset_id.into();
        Ok(self)
    }

    pub fn domain_id(&mut self, domain_id: impl Into<String>) -> Result<&mut Self, BuildError> {
        self.fields.mark("domain_id")?;
        self.domain_id = domain_id.into();
        Ok(self)
    }

    pub fn precision(&mut self, precision: u8) -> Result<&mut Self, BuildError> {
        self.fields.mark("precision")?;
        self.precision = precision;
        Ok(self)
    }

    pub fn build(&self) -> Result<Asset, BuildError> {
        self.fields.ensure_complete()?;
        validate_domain(&self.domain_id)?;
        validate_asset_id(&self.asset_id, &self.domain_id)?;

        Ok(Asset {
            asset_id: self.asset_id.clone(),
            domain_id: self.domain_id.clone(),
            precision: self.precision,
        })
    }
}

fn invalid(field: &'static str, reason: String) -> BuildError {
    BuildError::InvalidField {
        builder: BUILDER,
        field,
        reason,
    }
}

/// Dot-separated labels of ASCII alphanumerics and '-', at most 255 bytes.
fn validate_domain(domain: &str) -> Result<(), BuildError> {
    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    };
    if domain.is_empty() || domain.len() > 255 || !domain.split('.').all(valid_label) {
        return Err(invalid("domain_id", format!("'{domain}' is not a valid domain")));
    }
    Ok(())
}

/// `name#domain`, where name is 1..=32 of `[a-z0-9_]` and domain matches `domain_id`.
fn validate_asset_id(asset_id: &str, domain: &str) -> Result<(), BuildError> {
    let Some((name, asset_domain)) = asset_id.split_once('#') else {
        return Err(invalid("asset_id", format!("'{asset_id}' is not of the form name#domain")));
    };
    let name_ok = (1..=32).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if !name_ok {
        return Err(invalid("asset_id", format!("invalid asset name '{name}'")));
    }
    if asset_domain != domain {
        return Err(invalid(
            "asset_id",
            format!("asset domain '{asset_domain}' differs from domain_id '{domain}'"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_builder() -> AssetBuilder {
        let mut builder = AssetBuilder::new();
        builder
            .asset_id("bit#connect")
            .and_then(|b| b.domain_id("connect"))
            .and_then(|b| b.precision(2))
            .unwrap();
        builder
    }

    #[test]
    fn test_stateless_valid_all_fields() {
        let asset = valid_builder().build().unwrap();
        assert_eq!(asset.asset_id, "bit#connect");
        assert_eq!(asset.domain_id, "connect");
        assert_eq!(asset.precision, 2);
    }

    #[test]
    fn test_several_objects_from_one_builder() {
        let builder = valid_builder();
        let a = Box::new(builder.build().unwrap());
        let b = Box::new(builder.build().unwrap());

        assert!(!std::ptr::eq(a.as_ref(), b.as_ref()));
        assert_eq!(a.asset_id, b.asset_id);
        assert_eq!(a.domain_id, b.domain_id);
        assert_eq!(a.precision, b.precision);
    }

    #[test]
    fn test_invalid_fields() {
        let bad_domain = AssetBuilder::new()
            .asset_id("bit#-bad")
            .and_then(|b| b.domain_id("-bad"))
            .and_then(|b| b.precision(2))
            .and_then(|b| b.build());
        assert!(matches!(
            bad_domain,
            Err(BuildError::InvalidField { field: "domain_id", .. })
        ));

        let mismatched = AssetBuilder::new()
            .asset_id("bit#other")
            .and_then(|b| b.domain_id("connect"))
            .and_then(|b| b.precision(2))
            .and_then(|b| b.build());
        assert!(matches!(
            mismatched,
            Err(BuildError::InvalidField { field: "asset_id", .. })
        ));
    }

    #[test]
    fn test_missing_precision_reported() {
        let result = AssetBuilder::new()
            .asset_id("bit#connect")
            .and_then(|b| b.domain_id("connect"))
            .and_then(|b| b.build());
        assert_eq!(
            result.unwrap_err(),
            BuildError::UnsetFields {
                builder: "Asset",
                fields: vec!["precision"],
            }
        );
    }
}
