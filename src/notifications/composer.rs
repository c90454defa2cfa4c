use uuid::Uuid;

use crate::domain::order::events::NotificationEvent;
use crate::domain::order::value_objects::{format_money, OrderStatus, PhoneNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Client,
    Boss,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::Client => "client",
            Audience::Boss => "boss",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub order_id: Uuid,
    pub audience: Audience,
    pub destination: PhoneNumber,
    pub body: String,
}

/// Turns notification events into text. Client messages go out only when the
/// order allows it and a phone is on file; boss messages need a configured
/// boss phone.
#[derive(Debug, Clone, Default)]
pub struct MessageComposer {
    boss_phone: Option<PhoneNumber>,
}

impl MessageComposer {
    pub fn new(boss_phone: Option<PhoneNumber>) -> Self {
        let boss_phone = boss_phone.filter(|phone| !phone.as_str().trim().is_empty());
        Self { boss_phone }
    }

    pub fn compose(&self, event: &NotificationEvent) -> Vec<OutboundMessage> {
        let context = event.context();
        let mut messages = Vec::with_capacity(2);

        let client_phone = context
            .client
            .phone
            .as_ref()
            .filter(|phone| !phone.as_str().trim().is_empty());
        if let (true, Some(phone)) = (context.notify_client, client_phone) {
            messages.push(OutboundMessage {
                order_id: context.order_id,
                audience: Audience::Client,
                destination: phone.clone(),
                body: client_text(event),
            });
        }

        if let Some(boss) = &self.boss_phone {
            messages.push(OutboundMessage {
                order_id: context.order_id,
                audience: Audience::Boss,
                destination: boss.clone(),
                body: boss_text(event),
            });
        }

        messages
    }
}

fn client_text(event: &NotificationEvent) -> String {
    let context = event.context();
    let name = &context.client.name;
    let number = &context.order_number;

    match event {
        NotificationEvent::OrderCreated { .. } => {
            format!("Hola {}, registramos su orden de servicio {}.", name, number)
        }
        NotificationEvent::StatusChanged { to, presupuesto_amount, fecha_agendado, fecha_reparacion, .. } => {
            let mut text = format!("Hola {}, su orden {} ahora está {}.", name, number, status_label(*to));
            match to {
                OrderStatus::Facturado => {
                    if let Some(amount) = presupuesto_amount {
                        text.push_str(&format!(" Presupuesto: {}.", format_money(*amount)));
                    }
                }
                OrderStatus::Reparando => {
                    if let Some(date) = fecha_reparacion {
                        text.push_str(&format!(" Reparación programada para el {}.", date.format("%d/%m/%Y")));
                    }
                }
                OrderStatus::Pending => {
                    if let Some(date) = fecha_agendado {
                        text.push_str(&format!(" Visita programada para el {}.", date.format("%d/%m/%Y")));
                    }
                }
                OrderStatus::Delivered => text.push_str(" ¡Gracias por su preferencia!"),
                _ => {}
            }
            text
        }
        NotificationEvent::PaymentRecorded { amount, method, paid_amount, total_amount, remaining, .. } => {
            let mut text = format!(
                "Hola {}, recibimos su pago de {} ({}) para la orden {}. Pagado: {} de {}.",
                name,
                format_money(*amount),
                method,
                number,
                format_money(*paid_amount),
                format_money(*total_amount)
            );
            if remaining.is_zero() {
                text.push_str(" Su orden está liquidada.");
            } else {
                text.push_str(&format!(" Saldo pendiente: {}.", format_money(*remaining)));
            }
            text
        }
        NotificationEvent::VisitScheduled { fecha_agendado, .. } => format!(
            "Hola {}, su visita para la orden {} quedó programada para el {}.",
            name,
            number,
            fecha_agendado.format("%d/%m/%Y")
        ),
    }
}

fn boss_text(event: &NotificationEvent) -> String {
    let context = event.context();
    let number = &context.order_number;

    match event {
        NotificationEvent::OrderCreated { status, .. } => {
            format!("[{}] Nueva orden para {} ({})", number, context.client.name, status)
        }
        NotificationEvent::StatusChanged { note, .. } => format!("[{}] {}: {}", number, context.client.name, note),
        NotificationEvent::PaymentRecorded { amount, method, paid_amount, total_amount, remaining, .. } => format!(
            "[{}] Pago {} {} registrado. Pagado {} de {}, saldo {}",
            number,
            method,
            format_money(*amount),
            format_money(*paid_amount),
            format_money(*total_amount),
            format_money(*remaining)
        ),
        NotificationEvent::VisitScheduled { fecha_agendado, .. } => format!(
            "[{}] {}: visita programada para el {}",
            number,
            context.client.name,
            fecha_agendado.format("%d/%m/%Y")
        ),
    }
}

fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Preorder => "registrada",
        OrderStatus::Pending => "pendiente de visita",
        OrderStatus::Assigned => "asignada a un técnico",
        OrderStatus::InProgress => "en diagnóstico",
        OrderStatus::Aprobado => "aprobada",
        OrderStatus::NoAprobado => "no aprobada",
        OrderStatus::PendienteAvisar => "pendiente de confirmación",
        OrderStatus::Facturado => "cotizada",
        OrderStatus::Reparando => "en reparación",
        OrderStatus::Completed => "reparada",
        OrderStatus::EntregaGenerada => "lista para entrega",
        OrderStatus::Delivered => "entregada",
        OrderStatus::GarantiaAplicada => "en garantía",
        OrderStatus::GarantiaResuelta => "con garantía resuelta",
        OrderStatus::Cancelled => "cancelada",
    }
}
