//! Upstream registration API client
//!
//! Before an AR letter can be produced the recipient is registered with the
//! municipal back office, which assigns the tracking number, the shipment
//! (batch) number and the return address. The exchange is two requests:
//!
//! 1. an OAuth client-credentials token (form POST)
//! 2. the include request (JSON POST with the bearer token)
//!
//! The API signals rejection in the body, either as
//! `{"error": true, "message": ...}` or `{"data": {"erro": true, "message": ...}}`,
//! sometimes with a 200 status.

use crate::config::RegistrationConfig;
use crate::document::{DocumentKind, format_with_mask, validate_document};
use crate::error::{RegistrationError, Result};
use crate::record::{BatchContext, ObjectIdentifier, RecipientEntry};
use crate::utils::{convert_keys, to_camel_case};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Object acronym used when the API does not send one
pub const DEFAULT_OBJECT_ACRONYM: &str = "YY";

/// Recipient data as entered in the client form
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientForm {
    /// CPF or CNPJ, usually masked
    pub document: String,
    /// First name
    pub name: String,
    /// Surname
    #[serde(default)]
    pub surname: String,
    /// House number (may be empty)
    #[serde(default)]
    pub number: String,
    /// Street
    pub street: String,
    /// Neighborhood
    #[serde(default)]
    pub neighborhood: String,
    /// City
    pub city: String,
    /// State, two letters
    pub state: String,
    /// Postal code
    pub zip_code: String,
    /// Complement
    #[serde(default)]
    pub complement: Option<String>,
}

impl RecipientForm {
    /// Whether the document passes the CPF/CNPJ checksum
    pub fn is_valid(&self) -> bool {
        validate_document(&self.document)
    }

    /// Document kind for user-facing messages
    pub fn document_kind(&self) -> DocumentKind {
        DocumentKind::detect(&self.document)
    }

    /// Body of the include request
    pub fn to_request(&self) -> RegistrationRequest {
        let number = self.number.trim();
        RegistrationRequest {
            cpfcnpj: self.document.clone(),
            destinatario: format!("{} {}", self.name.trim(), self.surname.trim())
                .trim()
                .to_string(),
            numero: if number.is_empty() {
                Value::from(0)
            } else {
                Value::from(number)
            },
            logradouro: self.street.clone(),
            bairro: self.neighborhood.clone(),
            cidade: self.city.clone(),
            uf: self.state.clone(),
            cep: self.zip_code.clone(),
            complemento: self.complement.clone(),
        }
    }
}

/// Include request body, in the API's field names
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// CPF or CNPJ
    pub cpfcnpj: String,
    /// Full recipient name
    pub destinatario: String,
    /// House number, `0` when absent
    pub numero: Value,
    /// Street
    pub logradouro: String,
    /// Neighborhood
    pub bairro: String,
    /// City
    pub cidade: String,
    /// State
    pub uf: String,
    /// Postal code
    pub cep: String,
    /// Complement
    pub complemento: Option<String>,
}

/// Accept strings, numbers and null where the API is inconsistent
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_optional<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_string(deserializer)?;
    Ok((!value.trim().is_empty()).then_some(value))
}

/// `dados_cliente`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClientData {
    /// Client identifier literal
    #[serde(default, deserialize_with = "lenient_string")]
    pub identificador: String,
}

/// `dados_carta`: the letter and its recipient
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LetterData {
    /// Tracking number without verification digit
    #[serde(default, deserialize_with = "lenient_string")]
    pub numero_objeto: String,
    /// Client code
    #[serde(default, deserialize_with = "lenient_string")]
    pub codigo_cliente: String,
    /// Shipment number
    #[serde(default, deserialize_with = "lenient_string")]
    pub lote: String,
    /// Recipient name
    #[serde(default, deserialize_with = "lenient_string")]
    pub nome: String,
    /// Postal code
    #[serde(default, deserialize_with = "lenient_string")]
    pub cep: String,
    /// Street
    #[serde(default, deserialize_with = "lenient_string")]
    pub logradouro: String,
    /// House number
    #[serde(default, deserialize_with = "lenient_string")]
    pub numero: String,
    /// Complement
    #[serde(default, deserialize_with = "lenient_optional")]
    pub complemento: Option<String>,
    /// Neighborhood
    #[serde(default, deserialize_with = "lenient_string")]
    pub bairro: String,
    /// City
    #[serde(default, deserialize_with = "lenient_string")]
    pub cidade: String,
    /// State
    #[serde(default, deserialize_with = "lenient_string")]
    pub uf: String,
}

/// `dados_devolucao`: where undeliverable letters go
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReturnData {
    /// Sender name, printed as the client name
    #[serde(default, deserialize_with = "lenient_string")]
    pub nome: String,
    /// Postal code
    #[serde(default, deserialize_with = "lenient_string")]
    pub cep_devolucao: String,
    /// Street
    #[serde(default, deserialize_with = "lenient_string")]
    pub logradouro_devolucao: String,
    /// House number
    #[serde(default, deserialize_with = "lenient_string")]
    pub numero_devolucao: String,
    /// Complement
    #[serde(default, deserialize_with = "lenient_optional")]
    pub complemento_devolucao: Option<String>,
    /// Neighborhood
    #[serde(default, deserialize_with = "lenient_string")]
    pub bairro_devolucao: String,
    /// City
    #[serde(default, deserialize_with = "lenient_string")]
    pub cidade_devolucao: String,
    /// State
    #[serde(default, deserialize_with = "lenient_string")]
    pub uf_devolucao: String,
}

/// The `data` object of a successful include response
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegistrationResponse {
    /// Object acronym (postal type)
    #[serde(default, deserialize_with = "lenient_optional")]
    pub sigla_objeto: Option<String>,
    /// Client data
    #[serde(default)]
    pub dados_cliente: ClientData,
    /// Letter data
    #[serde(default)]
    pub dados_carta: LetterData,
    /// Return address
    #[serde(default)]
    pub dados_devolucao: ReturnData,
}

/// A postal address as echoed back to the client
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PostalAddress {
    /// Addressee
    pub name: String,
    /// Masked postal code
    pub zip_code: String,
    /// Street
    pub street: String,
    /// House number
    pub number: String,
    /// Complement
    pub complement: Option<String>,
    /// Neighborhood
    pub neighborhood: String,
    /// City
    pub city: String,
    /// State
    pub state: String,
}

/// Everything needed to produce and report one AR batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shipment {
    /// Batch context for the encoder
    pub context: BatchContext,
    /// The single recipient of the batch
    pub recipient: RecipientEntry,
    /// Return address
    pub return_address: PostalAddress,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ObjectView<'a> {
    client_code: &'a str,
    client_name: &'a str,
    client_identifier: &'a str,
    shipping: u32,
    object_acronym: &'a str,
    object_number: String,
    free_content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ShipmentView<'a> {
    return_data: &'a PostalAddress,
    object_data: ObjectView<'a>,
    recipient_data: PostalAddress,
}

impl Shipment {
    /// Data sent back to the client with the success event, camelCase keys
    pub fn payload(&self) -> Result<Value> {
        let context = &self.context;
        let object_number =
            ObjectIdentifier::new(&context.object_acronym, context.tracking_base)?.to_string();
        let recipient = &self.recipient;

        let view = ShipmentView {
            return_data: &self.return_address,
            object_data: ObjectView {
                client_code: &context.client_code,
                client_name: &context.client_name,
                client_identifier: &context.client_identifier,
                shipping: context.shipment,
                object_acronym: &context.object_acronym,
                object_number,
                free_content: &context.free_content,
            },
            recipient_data: PostalAddress {
                name: recipient.name.clone(),
                zip_code: format_with_mask(&recipient.postal_code, None),
                street: recipient.street.clone(),
                number: recipient.number.clone(),
                complement: recipient.complement.clone(),
                neighborhood: recipient.neighborhood.clone(),
                city: recipient.city.clone(),
                state: recipient.state.clone(),
            },
        };

        Ok(convert_keys(serde_json::to_value(view)?, to_camel_case))
    }
}

fn parse_number(field: &str, value: &str) -> Result<u32> {
    value.trim().parse().map_err(|_| {
        RegistrationError::MalformedResponse(format!("{field} is not a number: {value:?}")).into()
    })
}

impl RegistrationResponse {
    /// Map the API data onto a batch context and its recipient
    ///
    /// `document` is the recipient's CPF/CNPJ as submitted; the API does not
    /// echo it back.
    pub fn into_shipment(
        self,
        client_acronym: &str,
        created_on: NaiveDate,
        document: &str,
    ) -> Result<Shipment> {
        let letter = self.dados_carta;
        let returns = self.dados_devolucao;

        let context = BatchContext {
            client_acronym: client_acronym.to_string(),
            client_code: letter.codigo_cliente.trim().to_string(),
            client_name: returns.nome.clone(),
            client_identifier: self.dados_cliente.identificador,
            object_acronym: self
                .sigla_objeto
                .unwrap_or_else(|| DEFAULT_OBJECT_ACRONYM.to_string()),
            tracking_base: parse_number("numero_objeto", &letter.numero_objeto)?,
            shipment: parse_number("lote", &letter.lote)?,
            free_content: String::new(),
            created_on,
        };

        let recipient = RecipientEntry {
            name: letter.nome,
            document: document.to_string(),
            street: letter.logradouro,
            number: letter.numero,
            complement: letter.complemento,
            neighborhood: letter.bairro,
            city: letter.cidade,
            state: letter.uf,
            postal_code: letter.cep,
        };

        let return_address = PostalAddress {
            name: returns.nome,
            zip_code: format_with_mask(&returns.cep_devolucao, None),
            street: returns.logradouro_devolucao,
            number: returns.numero_devolucao,
            complement: returns.complemento_devolucao,
            neighborhood: returns.bairro_devolucao,
            city: returns.cidade_devolucao,
            state: returns.uf_devolucao,
        };

        Ok(Shipment {
            context,
            recipient,
            return_address,
        })
    }
}

/// Registers recipients with the upstream API
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Register one recipient and return the assigned shipment data
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::TokenUnavailable`] if no access token could be obtained
    /// - [`RegistrationError::Rejected`] if the API refused the request
    /// - [`RegistrationError::MalformedResponse`] if the answer has no usable data
    async fn include(&self, request: &RegistrationRequest) -> Result<RegistrationResponse>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// [`Registrar`] talking to the HTTP API with reqwest
#[derive(Clone, Debug)]
pub struct HttpRegistrar {
    client: reqwest::Client,
    config: RegistrationConfig,
    timeout: Duration,
}

impl HttpRegistrar {
    /// Create a client; `timeout` bounds each request
    pub fn new(config: RegistrationConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            timeout,
        }
    }

    async fn token(&self) -> std::result::Result<String, RegistrationError> {
        let url = self.config.token_url();
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", self.config.grant_type.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "token request failed");
                RegistrationError::TokenUnavailable(e.to_string())
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(url = %url, status = %status, "token endpoint refused");
            return Err(RegistrationError::TokenUnavailable(format!(
                "token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistrationError::TokenUnavailable(e.to_string()))?;
        Ok(token.access_token)
    }
}

/// Message of a body-level rejection, if the body is one
fn rejection_message(body: &Value) -> Option<String> {
    let message_of = |v: &Value| {
        v.get("message")
            .and_then(Value::as_str)
            .unwrap_or("registration failed")
            .to_string()
    };

    if body.get("error").and_then(Value::as_bool) == Some(true) {
        return Some(message_of(body));
    }
    let nested = body.get("data")?;
    (nested.get("erro").and_then(Value::as_bool) == Some(true)).then(|| message_of(nested))
}

#[async_trait]
impl Registrar for HttpRegistrar {
    async fn include(&self, request: &RegistrationRequest) -> Result<RegistrationResponse> {
        let token = self.token().await?;
        let url = self.config.include_url();

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).map_err(|_| {
            if status.is_success() {
                RegistrationError::MalformedResponse(format!("non-JSON body: {text}"))
            } else {
                RegistrationError::Rejected {
                    status: status.as_u16(),
                    message: text.clone(),
                }
            }
        })?;

        if let Some(message) = rejection_message(&body) {
            tracing::warn!(url = %url, status = %status, message = %message, "registration rejected");
            return Err(RegistrationError::Rejected {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        if !status.is_success() {
            return Err(RegistrationError::Rejected {
                status: status.as_u16(),
                message: text,
            }
            .into());
        }

        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| RegistrationError::MalformedResponse("missing data object".into()))?;
        let parsed: RegistrationResponse = serde_json::from_value(data)
            .map_err(|e| RegistrationError::MalformedResponse(e.to_string()))?;

        tracing::info!(
            tracking = %parsed.dados_carta.numero_objeto,
            shipment = %parsed.dados_carta.lote,
            "recipient registered"
        );
        Ok(parsed)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn sample_form() -> RecipientForm {
        RecipientForm {
            document: "529.982.247-25".into(),
            name: "Maria".into(),
            surname: "da Conceição".into(),
            number: "120".into(),
            street: "Rua das Flores".into(),
            neighborhood: "Centro".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
            zip_code: "01310-100".into(),
            complement: Some("Apto 3".into()),
        }
    }

    pub(crate) fn sample_data() -> Value {
        json!({
            "sigla_objeto": "YY",
            "dados_cliente": {"identificador": "PMX00001"},
            "dados_carta": {
                "numero_objeto": 42,
                "codigo_cliente": "123",
                "lote": "15",
                "nome": "Maria da Conceição",
                "cep": "01310-100",
                "logradouro": "Rua das Flores",
                "numero": 120,
                "complemento": "Apto 3",
                "bairro": "Centro",
                "cidade": "São Paulo",
                "uf": "SP"
            },
            "dados_devolucao": {
                "nome": "Prefeitura Municipal",
                "cep_devolucao": "88010000",
                "logradouro_devolucao": "Praça XV",
                "numero_devolucao": "1",
                "complemento_devolucao": null,
                "bairro_devolucao": "Centro",
                "cidade_devolucao": "Florianópolis",
                "uf_devolucao": "SC"
            }
        })
    }

    fn config_for(server: &MockServer) -> RegistrationConfig {
        RegistrationConfig {
            base_url: server.uri(),
            token_uri: "/oauth/token".into(),
            include_uri: "/ar/include".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            grant_type: "client_credentials".into(),
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
            .mount(server)
            .await;
    }

    #[test]
    fn test_form_to_request() {
        let request = sample_form().to_request();
        assert_eq!(request.destinatario, "Maria da Conceição");
        assert_eq!(request.numero, json!("120"));
        assert_eq!(request.cep, "01310-100");

        let mut form = sample_form();
        form.number = " ".into();
        assert_eq!(form.to_request().numero, json!(0));
    }

    #[test]
    fn test_form_document_checks() {
        let mut form = sample_form();
        assert!(form.is_valid());
        assert_eq!(form.document_kind(), DocumentKind::Cpf);

        form.document = "11.222.333/0001-82".into();
        assert!(!form.is_valid());
        assert_eq!(form.document_kind(), DocumentKind::Cnpj);
    }

    #[test]
    fn test_into_shipment_maps_fields() {
        let response: RegistrationResponse = serde_json::from_value(sample_data()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let shipment = response
            .into_shipment("PMX", date, "529.982.247-25")
            .unwrap();

        assert_eq!(shipment.context, crate::record::tests::sample_context());
        assert_eq!(shipment.recipient, crate::record::tests::sample_entry());
        assert_eq!(shipment.return_address.zip_code, "88010-000");
        assert_eq!(shipment.return_address.complement, None);
    }

    #[test]
    fn test_missing_acronym_defaults() {
        let mut data = sample_data();
        data.as_object_mut().unwrap().remove("sigla_objeto");
        let response: RegistrationResponse = serde_json::from_value(data).unwrap();
        let shipment = response
            .into_shipment("PMX", NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(), "52998224725")
            .unwrap();
        assert_eq!(shipment.context.object_acronym, DEFAULT_OBJECT_ACRONYM);
    }

    #[test]
    fn test_non_numeric_tracking_is_malformed() {
        let mut data = sample_data();
        data["dados_carta"]["numero_objeto"] = json!("abc");
        let response: RegistrationResponse = serde_json::from_value(data).unwrap();
        let err = response
            .into_shipment("PMX", NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(), "52998224725")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_payload_uses_camel_case_keys() {
        let response: RegistrationResponse = serde_json::from_value(sample_data()).unwrap();
        let shipment = response
            .into_shipment("PMX", NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(), "52998224725")
            .unwrap();

        let payload = shipment.payload().unwrap();
        assert_eq!(payload["objectData"]["objectNumber"], "YY000000425BR");
        assert_eq!(payload["objectData"]["objectAcronym"], "YY");
        assert_eq!(payload["objectData"]["clientCode"], "123");
        assert_eq!(payload["objectData"]["shipping"], 15);
        assert_eq!(payload["recipientData"]["zipCode"], "01310-100");
        assert_eq!(payload["returnData"]["name"], "Prefeitura Municipal");
    }

    #[test]
    fn test_rejection_shapes() {
        assert_eq!(
            rejection_message(&json!({"error": true, "message": "CPF bloqueado"})),
            Some("CPF bloqueado".into())
        );
        assert_eq!(
            rejection_message(&json!({"data": {"erro": true, "message": "Lote fechado"}})),
            Some("Lote fechado".into())
        );
        assert_eq!(rejection_message(&json!({"data": {"erro": false}})), None);
        assert_eq!(rejection_message(&json!({"data": sample_data()})), None);
    }

    #[tokio::test]
    async fn test_include_success() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/ar/include"))
            .and(header("authorization", "Bearer tok"))
            .and(body_string_contains("\"cpfcnpj\":\"529.982.247-25\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": sample_data()})))
            .expect(1)
            .mount(&server)
            .await;

        let registrar = HttpRegistrar::new(config_for(&server), Duration::from_secs(5));
        let response = registrar.include(&sample_form().to_request()).await.unwrap();

        assert_eq!(response.dados_cliente.identificador, "PMX00001");
        assert_eq!(response.dados_carta.numero_objeto, "42");
        assert_eq!(response.dados_carta.lote, "15");
    }

    #[tokio::test]
    async fn test_token_failure_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let registrar = HttpRegistrar::new(config_for(&server), Duration::from_secs(5));
        let err = registrar
            .include(&sample_form().to_request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Registration(RegistrationError::TokenUnavailable(_))
        ));
        assert_eq!(crate::error::ToHttpStatus::status_code(&err), 503);
    }

    #[tokio::test]
    async fn test_body_level_rejection() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/ar/include"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"erro": true, "message": "Lote fechado"}})),
            )
            .mount(&server)
            .await;

        let registrar = HttpRegistrar::new(config_for(&server), Duration::from_secs(5));
        match registrar.include(&sample_form().to_request()).await {
            Err(Error::Registration(RegistrationError::Rejected { status, message })) => {
                assert_eq!(status, 200);
                assert_eq!(message, "Lote fechado");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_top_level_error_with_status() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/ar/include"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({"error": true, "message": "CPF inválido"})),
            )
            .mount(&server)
            .await;

        let registrar = HttpRegistrar::new(config_for(&server), Duration::from_secs(5));
        let err = registrar
            .include(&sample_form().to_request())
            .await
            .unwrap_err();
        assert_eq!(crate::error::ToHttpStatus::status_code(&err), 422);
        assert!(err.to_string().contains("CPF inválido"));
    }
}
