//! Item Models

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub size: String,
}

/// Validated fields for a new item
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    name: String,
    price: f64,
    size: String,
}

impl NewItem {
    pub fn new(name: &str, price: f64, size: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            name: validate_text("name", name)?,
            price: validate_price(price)?,
            size: validate_text("size", size)?,
        })
    }

    pub fn parse(request: CreateItemRequest) -> Result<Self, ServiceError> {
        let (Some(name), Some(price), Some(size)) = (request.name, request.price, request.size)
        else {
            return Err(ServiceError::invalid("name, price, and size are required"));
        };
        Self::new(&name, price, &size)
    }

    pub(crate) fn into_item(self, id: Uuid) -> Item {
        Item {
            id,
            name: self.name,
            price: self.price,
            size: self.size,
        }
    }
}

/// Validated partial update. At least one field is present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    name: Option<String>,
    price: Option<f64>,
    size: Option<String>,
}

impl ItemPatch {
    pub fn parse(request: UpdateItemRequest) -> Result<Self, ServiceError> {
        let patch = Self {
            name: request.name.as_deref().map(|n| validate_text("name", n)).transpose()?,
            price: request.price.map(validate_price).transpose()?,
            size: request.size.as_deref().map(|s| validate_text("size", s)).transpose()?,
        };

        if patch.is_empty() {
            return Err(ServiceError::invalid(
                "at least one of name, price, or size must be provided",
            ));
        }
        Ok(patch)
    }

    pub fn name(mut self, name: &str) -> Result<Self, ServiceError> {
        self.name = Some(validate_text("name", name)?);
        Ok(self)
    }

    pub fn price(mut self, price: f64) -> Result<Self, ServiceError> {
        self.price = Some(validate_price(price)?);
        Ok(self)
    }

    pub fn size(mut self, size: &str) -> Result<Self, ServiceError> {
        self.size = Some(validate_text("size", size)?);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.size.is_none()
    }

    pub(crate) fn apply(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(size) = &self.size {
            item.size = size.clone();
        }
    }
}

fn validate_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn validate_price(price: f64) -> Result<f64, ServiceError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ServiceError::invalid("price must be a positive number"));
    }
    Ok(price)
}

/// Item creation request body
#[derive(Debug, Default, Deserialize)]
pub struct CreateItemRequest {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub size: Option<String>,
}

/// Item update request body; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub size: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_validation() {
        assert!(NewItem::new("Widget", 9.99, "M").is_ok());
        assert!(NewItem::new("", 9.99, "M").is_err());
        assert!(NewItem::new("Widget", 9.99, "  ").is_err());
        assert!(NewItem::new("Widget", 0.0, "M").is_err());
        assert!(NewItem::new("Widget", -1.0, "M").is_err());
        assert!(NewItem::new("Widget", f64::NAN, "M").is_err());
        assert!(NewItem::new("Widget", f64::INFINITY, "M").is_err());
    }

    #[test]
    fn test_create_request_requires_all_fields() {
        let missing_price = CreateItemRequest {
            name: Some("Widget".to_string()),
            price: None,
            size: Some("M".to_string()),
        };
        assert!(matches!(
            NewItem::parse(missing_price),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut item = NewItem::new("Widget", 9.99, "M")
            .unwrap()
            .into_item(Uuid::new_v4());
        let before = item.clone();

        let patch = ItemPatch::parse(UpdateItemRequest {
            price: Some(12.5),
            ..Default::default()
        })
        .unwrap();
        patch.apply(&mut item);

        assert_eq!(item.price, 12.5);
        assert_eq!(item.name, before.name);
        assert_eq!(item.size, before.size);
        assert_eq!(item.id, before.id);
    }

    #[test]
    fn test_patch_rejects_empty_and_invalid() {
        assert!(ItemPatch::parse(UpdateItemRequest::default()).is_err());
        assert!(ItemPatch::parse(UpdateItemRequest {
            name: Some(" ".to_string()),
            ..Default::default()
        })
        .is_err());
        assert!(ItemPatch::default().price(-3.0).is_err());
    }
}
