//! Fixture builders for batch and transfer tests

use ar_courier::EventSink;
use ar_courier::record::field::Line;
use ar_courier::record::{BatchContext, RecipientEntry};
use ar_courier::types::{Event, SessionId};
use chrono::NaiveDate;
use std::sync::Mutex;

/// Context of a small municipal batch created on 2024-03-07
pub fn municipal_context() -> BatchContext {
    BatchContext {
        client_acronym: "PMX".into(),
        client_code: "123".into(),
        client_name: "Prefeitura Municipal".into(),
        client_identifier: "PMX00001".into(),
        object_acronym: "YY".into(),
        tracking_base: 42,
        shipment: 15,
        free_content: String::new(),
        created_on: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
    }
}

/// A recipient with a valid CPF
pub fn recipient(name: &str) -> RecipientEntry {
    RecipientEntry {
        name: name.into(),
        document: "529.982.247-25".into(),
        street: "Rua das Flores".into(),
        number: "120".into(),
        complement: Some("Apto 3".into()),
        neighborhood: "Centro".into(),
        city: "São Paulo".into(),
        state: "SP".into(),
        postal_code: "01310-100".into(),
    }
}

/// Return-file header line
pub fn return_header(client_name: &str, movement: &str, generated: &str) -> String {
    Line::new()
        .text(0, 1, 1)
        .zeros(123, 2, 5)
        .filler(6, 20)
        .text(client_name, 21, 60)
        .text(movement, 61, 68)
        .text(generated, 69, 76)
        .filler(77, 159)
        .zeros(15, 160, 164)
        .zeros(1, 165, 170)
        .to_string()
}

/// One object's outcome in a return file
pub struct ReturnedObject<'a> {
    pub object_number: u64,
    pub delivery_date: &'a str,
    pub discharge_code: &'a str,
    pub receiver_name: &'a str,
    pub receiver_id: &'a str,
    pub return_reason: &'a str,
}

/// Return-file detail line
pub fn return_detail(object: &ReturnedObject<'_>, sequence: u32) -> String {
    Line::new()
        .text(1, 1, 1)
        .zeros(123, 2, 5)
        .text("PMX00001", 6, 13)
        .text("YY", 14, 15)
        .zeros(object.object_number, 16, 24)
        .text("BR", 25, 26)
        .text("Notificação", 27, 86)
        .text(object.delivery_date, 87, 94)
        .text(object.discharge_code, 95, 96)
        .text("LOTE0001", 97, 104)
        .text(object.receiver_name, 105, 144)
        .text(object.receiver_id, 145, 156)
        .text(object.return_reason, 157, 158)
        .text("", 159, 159)
        .zeros(15, 160, 164)
        .zeros(sequence, 165, 170)
        .to_string()
}

/// Return-file trailer line
pub fn return_trailer(client_name: &str, record_count: u32, sequence: u32) -> String {
    Line::new()
        .text(2, 1, 1)
        .zeros(123, 2, 5)
        .filler(6, 20)
        .text(client_name, 21, 60)
        .zeros(record_count, 61, 66)
        .filler(67, 159)
        .zeros(15, 160, 164)
        .zeros(sequence, 165, 170)
        .to_string()
}

/// Event sink that remembers everything it was given
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<(SessionId, Event)>>,
}

impl CollectingSink {
    pub fn events_for(&self, session: &SessionId) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| target == session)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, session: &SessionId, event: Event) {
        self.events.lock().unwrap().push((session.clone(), event));
    }
}
