//! Preconditions for quote mutations.
//!
//! Every check returns `Err` on the first violation. Composed validators run
//! ownership before state so a non-owner never learns the quote's status.

use crate::domain::catalog::{GlassTypeId, Model};
use crate::domain::quote::{CartItem, Quote, QuoteId, UserId, VendorContact};
use crate::errors::DomainError;

/// Business cap on items carried from a cart into a single quote.
pub const MAX_CART_ITEMS: usize = 20;

pub const QUOTE_ENTITY: &str = "Cotización";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteOperation {
    AddItem,
    Send,
    Cancel,
}

impl QuoteOperation {
    pub fn not_draft_message(&self) -> &'static str {
        match self {
            Self::AddItem => "No se pueden agregar items a una cotización enviada o cancelada",
            Self::Send => "Solo se pueden enviar cotizaciones en estado borrador",
            Self::Cancel => "Solo se pueden cancelar cotizaciones en estado borrador",
        }
    }
}

pub fn validate_cart_not_empty(items: &[CartItem]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::invalid_argument(
            "El carrito está vacío. Agrega al menos un item para generar la cotización",
        ));
    }
    Ok(())
}

pub fn validate_cart_items_count(count: usize, max_items: usize) -> Result<(), DomainError> {
    if count < 1 || count > max_items {
        return Err(DomainError::invalid_argument(format!(
            "El carrito debe tener entre 1 y {max_items} items (tiene {count})"
        )));
    }
    Ok(())
}

pub fn validate_quote_exists<'a>(
    quote: Option<&'a Quote>,
    quote_id: &QuoteId,
) -> Result<&'a Quote, DomainError> {
    quote.ok_or_else(|| DomainError::not_found(QUOTE_ENTITY, quote_id.0.clone()))
}

pub fn validate_quote_ownership(quote: &Quote, requester: &UserId) -> Result<(), DomainError> {
    if !quote.is_owned_by(requester) {
        return Err(DomainError::PermissionDenied(
            "No tienes permiso para modificar esta cotización".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_quote_is_draft(
    quote: &Quote,
    operation: QuoteOperation,
) -> Result<(), DomainError> {
    if !quote.is_draft() {
        return Err(DomainError::invalid_state(operation.not_draft_message()));
    }
    Ok(())
}

pub fn validate_quote_has_items(quote: &Quote) -> Result<(), DomainError> {
    if quote.items.is_empty() {
        return Err(DomainError::invalid_state(
            "La cotización no tiene items. Agrega al menos un item antes de enviarla",
        ));
    }
    Ok(())
}

/// exists -> ownership -> is-draft -> has-items.
pub fn validate_send_to_vendor_requirements<'a>(
    quote: Option<&'a Quote>,
    quote_id: &QuoteId,
    requester: &UserId,
) -> Result<&'a Quote, DomainError> {
    let quote = validate_quote_exists(quote, quote_id)?;
    validate_quote_ownership(quote, requester)?;
    validate_quote_is_draft(quote, QuoteOperation::Send)?;
    validate_quote_has_items(quote)?;
    Ok(quote)
}

/// exists -> ownership -> is-draft, for adding items or canceling.
pub fn validate_draft_mutation_requirements<'a>(
    quote: Option<&'a Quote>,
    quote_id: &QuoteId,
    requester: &UserId,
    operation: QuoteOperation,
) -> Result<&'a Quote, DomainError> {
    let quote = validate_quote_exists(quote, quote_id)?;
    validate_quote_ownership(quote, requester)?;
    validate_quote_is_draft(quote, operation)?;
    Ok(quote)
}

pub fn validate_model_quotable(model: &Model) -> Result<(), DomainError> {
    if !model.is_quotable() {
        return Err(DomainError::invalid_argument(format!(
            "El modelo {} no está publicado y no se puede cotizar",
            model.name
        )));
    }
    Ok(())
}

pub fn validate_glass_compatibility(
    model: &Model,
    glass_type_id: &GlassTypeId,
) -> Result<(), DomainError> {
    if !model.accepts_glass(glass_type_id) {
        return Err(DomainError::invalid_argument(format!(
            "El tipo de vidrio {} no es compatible con el modelo {}",
            glass_type_id.0, model.name
        )));
    }
    Ok(())
}

pub fn validate_dimensions(model: &Model, width_mm: u32, height_mm: u32) -> Result<(), DomainError> {
    if width_mm < model.min_width_mm || width_mm > model.max_width_mm {
        return Err(DomainError::invalid_argument(format!(
            "El ancho debe estar entre {} y {} mm (recibido {width_mm} mm)",
            model.min_width_mm, model.max_width_mm
        )));
    }
    if height_mm < model.min_height_mm || height_mm > model.max_height_mm {
        return Err(DomainError::invalid_argument(format!(
            "El alto debe estar entre {} y {} mm (recibido {height_mm} mm)",
            model.min_height_mm, model.max_height_mm
        )));
    }
    Ok(())
}

pub fn validate_quantity(quantity: u32) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::invalid_argument("La cantidad debe ser al menos 1"));
    }
    Ok(())
}

pub fn validate_vendor_contact(contact: &VendorContact) -> Result<(), DomainError> {
    let phone_digits = contact.phone.chars().filter(char::is_ascii_digit).count();
    if contact.phone.trim().is_empty() || phone_digits < 7 {
        return Err(DomainError::invalid_argument(
            "El teléfono de contacto es obligatorio para enviar la cotización",
        ));
    }

    if let Some(email) = &contact.email {
        let email = email.trim();
        let well_formed = email
            .split_once('@')
            .map(|(user, domain)| !user.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !well_formed {
            return Err(DomainError::invalid_argument(format!(
                "El correo de contacto `{email}` no es válido"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::catalog::{GlassTypeId, Model, ModelId, ModelStatus};
    use crate::domain::quote::{
        CartItem, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus, UserId, VendorContact,
    };
    use crate::errors::{DomainError, ErrorKind};

    use super::*;

    fn owner() -> UserId {
        UserId("user-owner".to_string())
    }

    fn quote(status: QuoteStatus, with_item: bool) -> Quote {
        let now = Utc::now();
        let id = QuoteId("quote-1".to_string());
        let items = if with_item {
            vec![QuoteItem {
                id: QuoteItemId("item-1".to_string()),
                quote_id: id.clone(),
                model_id: ModelId("mdl-1".to_string()),
                glass_type_id: GlassTypeId("gls-1".to_string()),
                name: "Ventana".to_string(),
                width_mm: 1000,
                height_mm: 1000,
                quantity: 1,
                subtotal: Decimal::new(100, 0),
                services: Vec::new(),
                adjustments: Vec::new(),
                created_at: now,
            }]
        } else {
            Vec::new()
        };

        Quote {
            id,
            user_id: owner(),
            status,
            currency: "COP".to_string(),
            total: items.iter().map(|item| item.subtotal).sum(),
            valid_until: now + Duration::days(15),
            contact: None,
            project_address: None,
            sent_at: None,
            version: 1,
            items,
            created_at: now,
            updated_at: now,
        }
    }

    fn model() -> Model {
        Model {
            id: ModelId("mdl-1".to_string()),
            name: "Ventana corrediza".to_string(),
            status: ModelStatus::Published,
            base_price: Decimal::new(100, 0),
            cost_per_mm_width: Decimal::new(5, 2),
            cost_per_mm_height: Decimal::new(4, 2),
            accessory_price: None,
            min_width_mm: 400,
            max_width_mm: 2400,
            min_height_mm: 300,
            max_height_mm: 2200,
            compatible_glass_type_ids: vec![GlassTypeId("gls-1".to_string())],
            glass_discount_width_mm: 0,
            glass_discount_height_mm: 0,
        }
    }

    fn cart_item() -> CartItem {
        CartItem {
            model_id: ModelId("mdl-1".to_string()),
            glass_type_id: GlassTypeId("gls-1".to_string()),
            name: "Ventana".to_string(),
            width_mm: 1000,
            height_mm: 1000,
            quantity: 1,
            subtotal: Decimal::new(100, 0),
        }
    }

    #[test]
    fn empty_cart_is_invalid_argument() {
        let error = validate_cart_not_empty(&[]).expect_err("empty cart");
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert!(validate_cart_not_empty(&[cart_item()]).is_ok());
    }

    #[test]
    fn cart_count_is_capped() {
        assert!(validate_cart_items_count(0, MAX_CART_ITEMS).is_err());
        assert!(validate_cart_items_count(1, MAX_CART_ITEMS).is_ok());
        assert!(validate_cart_items_count(20, MAX_CART_ITEMS).is_ok());
        let error = validate_cart_items_count(21, MAX_CART_ITEMS).expect_err("over cap");
        assert!(error.to_string().contains("20"));
    }

    #[test]
    fn sending_a_quote_without_items_is_invalid_state() {
        let quote = quote(QuoteStatus::Draft, false);
        let error = validate_send_to_vendor_requirements(Some(&quote), &quote.id, &owner())
            .expect_err("no items");

        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert!(error.to_string().starts_with("La cotización no tiene items"));
    }

    #[test]
    fn sending_an_already_sent_quote_is_invalid_state() {
        let quote = quote(QuoteStatus::Sent, true);
        let error = validate_send_to_vendor_requirements(Some(&quote), &quote.id, &owner())
            .expect_err("already sent");

        assert_eq!(
            error,
            DomainError::InvalidState(
                "Solo se pueden enviar cotizaciones en estado borrador".to_string()
            )
        );
    }

    #[test]
    fn missing_quote_is_not_found() {
        let id = QuoteId("quote-missing".to_string());
        let error =
            validate_send_to_vendor_requirements(None, &id, &owner()).expect_err("missing");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn ownership_is_checked_before_state() {
        let stranger = UserId("user-stranger".to_string());
        for status in [QuoteStatus::Draft, QuoteStatus::Sent, QuoteStatus::Canceled] {
            let quote = quote(status, false);

            let send = validate_send_to_vendor_requirements(Some(&quote), &quote.id, &stranger)
                .expect_err("stranger send");
            assert_eq!(send.kind(), ErrorKind::PermissionDenied);

            let add = validate_draft_mutation_requirements(
                Some(&quote),
                &quote.id,
                &stranger,
                QuoteOperation::AddItem,
            )
            .expect_err("stranger add");
            assert_eq!(add.kind(), ErrorKind::PermissionDenied);
        }
    }

    #[test]
    fn adding_to_terminal_quotes_is_invalid_state() {
        for status in [QuoteStatus::Sent, QuoteStatus::Canceled] {
            let quote = quote(status, true);
            let error = validate_draft_mutation_requirements(
                Some(&quote),
                &quote.id,
                &owner(),
                QuoteOperation::AddItem,
            )
            .expect_err("terminal");
            assert_eq!(error.kind(), ErrorKind::InvalidState);
        }
    }

    #[test]
    fn valid_send_returns_the_quote() {
        let quote = quote(QuoteStatus::Draft, true);
        let validated = validate_send_to_vendor_requirements(Some(&quote), &quote.id, &owner())
            .expect("valid send");
        assert_eq!(validated.id, quote.id);
    }

    #[test]
    fn dimension_errors_name_the_violated_bound() {
        let model = model();
        let width = validate_dimensions(&model, 399, 1000).expect_err("too narrow");
        assert!(width.to_string().contains("entre 400 y 2400 mm"));

        let height = validate_dimensions(&model, 1000, 2201).expect_err("too tall");
        assert!(height.to_string().contains("entre 300 y 2200 mm"));

        assert!(validate_dimensions(&model, 400, 2200).is_ok());
    }

    #[test]
    fn model_and_glass_checks() {
        let mut model = model();
        assert!(validate_glass_compatibility(&model, &GlassTypeId("gls-1".to_string())).is_ok());
        assert_eq!(
            validate_glass_compatibility(&model, &GlassTypeId("gls-9".to_string()))
                .expect_err("incompatible")
                .kind(),
            ErrorKind::InvalidArgument
        );

        model.status = ModelStatus::Draft;
        assert!(validate_model_quotable(&model).is_err());
    }

    #[test]
    fn contact_requires_phone_and_well_formed_email() {
        let valid = VendorContact {
            phone: "+57 300 123 4567".to_string(),
            email: Some("obra@ejemplo.co".to_string()),
        };
        assert!(validate_vendor_contact(&valid).is_ok());

        let no_phone = VendorContact { phone: "  ".to_string(), email: None };
        assert!(validate_vendor_contact(&no_phone).is_err());

        let bad_email =
            VendorContact { phone: "3001234567".to_string(), email: Some("obra".to_string()) };
        assert!(validate_vendor_contact(&bad_email).is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(1).is_ok());
    }
}
