use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Service Order Value Objects
// ============================================================================

/// Minimum length (in characters, after trimming) of cancellation notes and
/// warranty resolution reasons.
pub const MIN_REASON_LEN: usize = 10;

/// IVA applied when an amount carries the `includeIVA` flag (16%).
pub fn iva_rate() -> Decimal {
    Decimal::new(16, 2)
}

/// Fixed re-visit fee charged when the client rejects the quote.
pub fn no_aprobado_fee() -> Decimal {
    Decimal::from(5)
}

/// Returns `amount` with IVA added when `include_iva` is set, rounded to cents.
pub fn with_iva(amount: Decimal, include_iva: bool) -> Decimal {
    if include_iva {
        (amount * (Decimal::ONE + iva_rate())).round_dp(2)
    } else {
        amount
    }
}

pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

pub(crate) fn meets_min_len(text: &str) -> bool {
    text.trim().chars().count() >= MIN_REASON_LEN
}

/// Lifecycle status of a service order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Preorder,
    Pending,
    Assigned,
    InProgress,
    Aprobado,
    NoAprobado,
    PendienteAvisar,
    Facturado,
    Reparando,
    Completed,
    EntregaGenerada,
    Delivered,
    GarantiaAplicada,
    GarantiaResuelta,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 15] = [
        OrderStatus::Preorder,
        OrderStatus::Pending,
        OrderStatus::Assigned,
        OrderStatus::InProgress,
        OrderStatus::Aprobado,
        OrderStatus::NoAprobado,
        OrderStatus::PendienteAvisar,
        OrderStatus::Facturado,
        OrderStatus::Reparando,
        OrderStatus::Completed,
        OrderStatus::EntregaGenerada,
        OrderStatus::Delivered,
        OrderStatus::GarantiaAplicada,
        OrderStatus::GarantiaResuelta,
        OrderStatus::Cancelled,
    ];

    /// The adjacency table: every status a `changeStatus` request may target
    /// from `self`. This is the only place the graph is defined.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;

        match self {
            Preorder => &[Pending, Cancelled],
            Pending => &[Pending, Assigned, Preorder, Cancelled],
            Assigned => &[Assigned, Facturado, Cancelled],
            InProgress => &[InProgress, Aprobado, NoAprobado, PendienteAvisar, Cancelled],
            Aprobado => &[Aprobado, Reparando, Cancelled],
            NoAprobado => &[NoAprobado, Aprobado, Cancelled],
            PendienteAvisar => &[PendienteAvisar, Aprobado, NoAprobado, Cancelled],
            Facturado => &[Facturado, Aprobado, NoAprobado, PendienteAvisar, Cancelled],
            Reparando => &[Reparando, Completed, Cancelled],
            Completed => &[Completed, Delivered, Cancelled],
            EntregaGenerada => &[EntregaGenerada, Delivered, Cancelled],
            Delivered => &[Cancelled],
            GarantiaAplicada => &[GarantiaAplicada, GarantiaResuelta, Cancelled],
            GarantiaResuelta => &[Delivered, Cancelled],
            Cancelled => &[Cancelled, Pending, Preorder],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Statuses from which a warranty claim may be opened.
    pub fn accepts_warranty_claim(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::EntregaGenerada)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Preorder => "PREORDER",
            OrderStatus::Pending => "PENDING",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Aprobado => "APROBADO",
            OrderStatus::NoAprobado => "NO_APROBADO",
            OrderStatus::PendienteAvisar => "PENDIENTE_AVISAR",
            OrderStatus::Facturado => "FACTURADO",
            OrderStatus::Reparando => "REPARANDO",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::EntregaGenerada => "ENTREGA_GENERADA",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::GarantiaAplicada => "GARANTIA_APLICADA",
            OrderStatus::GarantiaResuelta => "GARANTIA_RESUELTA",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    /// Payment status as a pure function of the paid and total amounts.
    /// A zero-total order is already `Paid`.
    pub fn derive(paid_amount: Decimal, total_amount: Decimal) -> Self {
        if paid_amount >= total_amount {
            PaymentStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarrantyPriority {
    Baja,
    Media,
    Alta,
}

impl fmt::Display for WarrantyPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarrantyPriority::Baja => write!(f, "BAJA"),
            WarrantyPriority::Media => write!(f, "MEDIA"),
            WarrantyPriority::Alta => write!(f, "ALTA"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationType {
    Permanent,
    Reschedule,
    Revert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Check,
    Other,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::Check => "CHECK",
            PaymentMethod::Other => "OTHER",
        };
        f.write_str(label)
    }
}

/// Appliance category; its prefix seeds the human-readable order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplianceType {
    Lavadora,
    Secadora,
    Refrigerador,
    Estufa,
    Horno,
    Microondas,
    Lavavajillas,
    AireAcondicionado,
    Otro,
}

impl ApplianceType {
    pub fn prefix(self) -> &'static str {
        match self {
            ApplianceType::Lavadora => "LAV",
            ApplianceType::Secadora => "SEC",
            ApplianceType::Refrigerador => "REF",
            ApplianceType::Estufa => "EST",
            ApplianceType::Horno => "HOR",
            ApplianceType::Microondas => "MIC",
            ApplianceType::Lavavajillas => "LVV",
            ApplianceType::AireAcondicionado => "AIR",
            ApplianceType::Otro => "OTR",
        }
    }

    pub fn order_number(self, sequence: u64) -> String {
        format!("{}-{:04}", self.prefix(), sequence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber(pub String);

impl PhoneNumber {
    pub fn new(phone: impl Into<String>) -> Self {
        Self(phone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContact {
    pub name: String,
    pub phone: Option<PhoneNumber>,
}

/// Structured budget description attached to a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptoOrden {
    pub header: String,
    pub body: String,
    pub base_amount: Decimal,
    #[serde(rename = "includeIVA")]
    pub include_iva: bool,
    pub total_with_tax: Decimal,
}

impl ConceptoOrden {
    pub fn new(header: impl Into<String>, body: impl Into<String>, base_amount: Decimal, include_iva: bool) -> Self {
        Self {
            header: header.into(),
            body: body.into(),
            base_amount,
            include_iva,
            total_with_tax: with_iva(base_amount, include_iva),
        }
    }
}

/// Warranty window; `end` is ignored when `unlimited` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarrantyWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub unlimited: bool,
}

impl WarrantyWindow {
    pub fn covers(&self, now: DateTime<Utc>) -> bool {
        self.unlimited || self.end.is_some_and(|end| end > now)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
