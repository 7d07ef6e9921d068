//! Discharge and return reason codes reported in AR return files.
//!
//! Both tables share one lookup space: a code found in either table
//! resolves, and the caller cannot tell which table it came from. Codes
//! do not currently collide, but if they ever do the return table wins.
//! [`lookup_discharge`] and [`lookup_return`] resolve within one table.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Discharge reasons ("motivo de baixa")
pub const DISCHARGE_REASONS: &[(&str, &str)] = &[
    ("01", "Entregue ao destinatário"),
    ("02", "Devolvido ao remetente"),
    ("03", "Objeto não postado fisicamente"),
    ("04", "Destruído com Autorização do Remetente"),
    ("18", "Objeto extraviado"),
    ("20", "Avariado"),
    ("29", "Roubo"),
    ("37", "Sinistro"),
    ("99", "Objeto sem AR Digital"),
];

/// Return reasons ("motivo de devolução")
///
/// `00` means "no return" and maps to an empty description.
pub const RETURN_REASONS: &[(&str, &str)] = &[
    ("00", ""),
    ("19", "Endereço incorreto"),
    ("21", "Ausente"),
    ("26", "Não procurado - Destinatário"),
    ("33", "Documentação não fornecida"),
    ("38", "Empresa falida"),
    ("48", "Endereço sem distribuição domiciliar"),
    ("71", "Mudou-se"),
    ("72", "Desconhecido"),
    ("73", "Recusado"),
    ("75", "Endereço insuficiente"),
    ("76", "Não existe o número indicado"),
    ("77", "Ausente - Devolvido ao remetente"),
    ("78", "Não procurado - remetente"),
    ("79", "Falecido"),
];

static MERGED: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    DISCHARGE_REASONS
        .iter()
        .chain(RETURN_REASONS)
        .copied()
        .collect()
});

/// Describe a discharge or return code
///
/// ```
/// use ar_courier::record::reasons::lookup;
///
/// assert_eq!(lookup("01"), "Entregue ao destinatário");
/// assert_eq!(lookup("71"), "Mudou-se");
/// assert_eq!(lookup("55"), "unknown code (55)");
/// ```
pub fn lookup(code: &str) -> String {
    MERGED
        .get(code)
        .map(|d| (*d).to_string())
        .unwrap_or_else(|| unknown(code))
}

/// Describe a code using only the discharge table
pub fn lookup_discharge(code: &str) -> String {
    find(DISCHARGE_REASONS, code)
}

/// Describe a code using only the return table
pub fn lookup_return(code: &str) -> String {
    find(RETURN_REASONS, code)
}

fn find(table: &[(&str, &str)], code: &str) -> String {
    table
        .iter()
        .find(|(k, _)| *k == code)
        .map(|(_, d)| (*d).to_string())
        .unwrap_or_else(|| unknown(code))
}

fn unknown(code: &str) -> String {
    format!("unknown code ({code})")
}
