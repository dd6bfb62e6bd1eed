use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::ledger::DocumentType;

/// Derived fulfillment state of a document header.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum FulfillmentStatus {
    #[sea_orm(string_value = "Outstanding")]
    Outstanding,
    #[sea_orm(string_value = "Partial")]
    Partial,
    #[sea_orm(string_value = "Success")]
    Success,
}

impl FulfillmentStatus {
    /// Derives a header status from `(requested, covered)` pairs of its non-cancelled lines.
    ///
    /// Returns `None` when there are no lines to judge, in which case the stored status
    /// is left as it is.
    pub fn derive(lines: &[(Decimal, Decimal)]) -> Option<Self> {
        if lines.is_empty() {
            return None;
        }
        if lines.iter().all(|(requested, covered)| covered >= requested) {
            Some(Self::Success)
        } else if lines.iter().all(|(_, covered)| covered.is_zero()) {
            Some(Self::Outstanding)
        } else {
            Some(Self::Partial)
        }
    }
}

/// Per-line indicator maintained on upstream detail lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum LineFlag {
    /// True until the line is referenced by a downstream line.
    Open,
    /// True once referenced.
    Used,
    /// True once referenced.
    Success,
}

impl LineFlag {
    pub fn column(&self) -> &'static str {
        match self {
            LineFlag::Open => "open",
            LineFlag::Used => "used",
            LineFlag::Success => "success",
        }
    }

    /// Flag value for a line that is (or is not) referenced by a live downstream line.
    pub fn value_for(&self, referenced: bool) -> bool {
        match self {
            LineFlag::Open => !referenced,
            LineFlag::Used | LineFlag::Success => referenced,
        }
    }
}

impl DocumentType {
    /// The document type this one is built from, if any.
    pub fn upstream(&self) -> Option<DocumentType> {
        match self {
            DocumentType::PurchaseOrderRequest => Some(DocumentType::MaterialRequest),
            DocumentType::PurchaseOrder => Some(DocumentType::PurchaseOrderRequest),
            DocumentType::PurchaseReceipt => Some(DocumentType::PurchaseOrder),
            DocumentType::PurchaseReturn => Some(DocumentType::PurchaseReceipt),
            DocumentType::MaterialReceive => Some(DocumentType::MaterialTransfer),
            _ => None,
        }
    }

    /// The document type built from this one, if any.
    pub fn downstream(&self) -> Option<DocumentType> {
        match self {
            DocumentType::MaterialRequest => Some(DocumentType::PurchaseOrderRequest),
            DocumentType::PurchaseOrderRequest => Some(DocumentType::PurchaseOrder),
            DocumentType::PurchaseOrder => Some(DocumentType::PurchaseReceipt),
            DocumentType::PurchaseReceipt => Some(DocumentType::PurchaseReturn),
            DocumentType::MaterialTransfer => Some(DocumentType::MaterialReceive),
            _ => None,
        }
    }

    /// Whether every line of this type must name an upstream line.
    pub fn requires_upstream(&self) -> bool {
        matches!(
            self,
            DocumentType::PurchaseOrderRequest
                | DocumentType::PurchaseReceipt
                | DocumentType::PurchaseReturn
                | DocumentType::MaterialReceive
        )
    }

    /// Line indicator driven by downstream references.
    pub fn line_flag(&self) -> Option<LineFlag> {
        match self {
            DocumentType::MaterialRequest => Some(LineFlag::Open),
            DocumentType::PurchaseOrderRequest | DocumentType::PurchaseReceipt => {
                Some(LineFlag::Used)
            }
            DocumentType::PurchaseOrder | DocumentType::MaterialTransfer => {
                Some(LineFlag::Success)
            }
            _ => None,
        }
    }

    /// Whether the header carries a derived [`FulfillmentStatus`].
    pub fn tracks_status(&self) -> bool {
        matches!(
            self,
            DocumentType::MaterialRequest
                | DocumentType::PurchaseOrderRequest
                | DocumentType::PurchaseOrder
                | DocumentType::MaterialTransfer
        )
    }

    /// Links into this type carry the physical stock, so batch and source must match upstream.
    pub fn links_stock_identity(&self) -> bool {
        matches!(
            self,
            DocumentType::PurchaseReturn | DocumentType::MaterialReceive
        )
    }
}

/// A header status written by the chain propagator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub doc_type: DocumentType,
    pub doc_no: String,
    pub from: Option<FulfillmentStatus>,
    pub to: FulfillmentStatus,
}

/// Reference from a downstream line to the upstream line that authorised it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpstreamRef {
    pub doc_no: String,
    pub line_no: i32,
}

impl UpstreamRef {
    pub fn new(doc_no: impl Into<String>, line_no: i32) -> Self {
        Self {
            doc_no: doc_no.into(),
            line_no,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case(&[(dec!(10), dec!(10))], Some(FulfillmentStatus::Success))]
    #[case(&[(dec!(10), dec!(4))], Some(FulfillmentStatus::Partial))]
    #[case(&[(dec!(10), dec!(0))], Some(FulfillmentStatus::Outstanding))]
    #[case(&[(dec!(10), dec!(10)), (dec!(5), dec!(0))], Some(FulfillmentStatus::Partial))]
    #[case(&[(dec!(10), dec!(12)), (dec!(5), dec!(5))], Some(FulfillmentStatus::Success))]
    #[case(&[], None)]
    fn derives_header_status(
        #[case] lines: &[(Decimal, Decimal)],
        #[case] expected: Option<FulfillmentStatus>,
    ) {
        assert_eq!(FulfillmentStatus::derive(lines), expected);
    }

    #[test]
    fn open_flag_is_inverted() {
        assert!(LineFlag::Open.value_for(false));
        assert!(!LineFlag::Open.value_for(true));
        assert!(LineFlag::Success.value_for(true));
        assert!(!LineFlag::Used.value_for(false));
    }

    #[test]
    fn chain_links_are_symmetric() {
        for doc_type in DocumentType::iter() {
            if let Some(downstream) = doc_type.downstream() {
                assert_eq!(downstream.upstream(), Some(doc_type));
                assert!(doc_type.line_flag().is_some(), "{doc_type} has no line flag");
            }
            if doc_type.requires_upstream() {
                assert!(doc_type.upstream().is_some());
            }
        }
    }
}
