//! The submit flow: form in, background upload out.

use super::Dispatcher;
use crate::error::{Error, RegistrationError, Result};
use crate::record::{BatchContract, encode_batch};
use crate::registration::{RecipientForm, RegistrationResponse, Shipment};
use crate::staging::{StagedFile, staged_file_name};
use crate::types::{Event, SessionId, TransferState};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Loader text while the batch is being prepared
pub const PREPARING_MESSAGE: &str = "Preparing...";

/// Loader text while the batch is being encoded
pub const GENERATING_MESSAGE: &str = "Generating AR...";

/// Loader text once the upload starts
pub const SENDING_MESSAGE: &str = "Sending file...";

/// Title of the error shown when registration fails
pub const REGISTRATION_ERROR_TITLE: &str = "Error!";

/// Title of the error shown when the batch cannot be produced
pub const AR_ERROR_TITLE: &str = "AR error";

/// Message of the error shown when the batch cannot be produced
pub const AR_ERROR_MESSAGE: &str = "An error occurred while generating the AR!";

impl Dispatcher {
    /// Register a recipient, produce its AR batch and start uploading it
    ///
    /// Every failure before the upload is also reported to the session as
    /// an event. The returned handle resolves once the upload reaches a
    /// terminal state; upload failures are reported only through events.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDocument`] if the CPF/CNPJ fails its checksum
    /// - [`Error::Registration`] if the upstream API refuses or is unreachable
    /// - [`Error::Encoding`] / [`Error::Staging`] if the batch cannot be produced
    /// - [`Error::Transfer`] if the session already has an upload running
    pub async fn submit(
        &self,
        session: &SessionId,
        form: RecipientForm,
    ) -> Result<JoinHandle<TransferState>> {
        let pipeline = self.pipeline_or_connect(session).await;

        if !form.is_valid() {
            let message = format!("The {} {} is not valid!", form.document_kind(), form.document);
            tracing::info!(session = %session, document = %form.document, "invalid document submitted");
            self.sink
                .emit(session, Event::InvalidDocument { message });
            return Err(Error::InvalidDocument {
                kind: form.document_kind(),
                document: form.document,
            });
        }

        let response = match self.registrar.include(&form.to_request()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "registration failed");
                self.sink.emit(
                    session,
                    Event::Error {
                        title: REGISTRATION_ERROR_TITLE.to_string(),
                        message: registration_message(&e),
                    },
                );
                return Err(e);
            }
        };

        self.sink.emit(session, Event::loader(PREPARING_MESSAGE));
        let (shipment, payload, file) = match self.prepare(session, response, &form.document).await {
            Ok(ready) => ready,
            Err(e) => {
                tracing::error!(session = %session, error = %e, "AR generation failed");
                self.sink.emit(
                    session,
                    Event::Error {
                        title: AR_ERROR_TITLE.to_string(),
                        message: AR_ERROR_MESSAGE.to_string(),
                    },
                );
                return Err(e);
            }
        };

        // The client may have gone away while the batch was being prepared
        let still_connected = self
            .pipeline(session)
            .await
            .is_some_and(|current| Arc::ptr_eq(&current, &pipeline));
        if !still_connected {
            tracing::info!(
                session = %session,
                path = %file.path.display(),
                "session disconnected before upload, batch left staged"
            );
            return Ok(tokio::spawn(async { TransferState::Cancelled }));
        }

        self.sink.emit(session, Event::loader(SENDING_MESSAGE));
        match pipeline.start_upload(file, payload).await {
            Ok(handle) => {
                tracing::info!(
                    session = %session,
                    shipment = shipment.context.shipment,
                    tracking_base = shipment.context.tracking_base,
                    "AR batch handed to transfer pipeline"
                );
                Ok(handle)
            }
            Err(e @ Error::Staging(_)) => {
                tracing::error!(session = %session, error = %e, "staged AR batch unreadable");
                self.sink.emit(
                    session,
                    Event::Error {
                        title: AR_ERROR_TITLE.to_string(),
                        message: AR_ERROR_MESSAGE.to_string(),
                    },
                );
                Err(e)
            }
            Err(e) => {
                self.sink.emit(
                    session,
                    Event::Error {
                        title: REGISTRATION_ERROR_TITLE.to_string(),
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Map the registration onto a batch, stage it and build the success payload
    async fn prepare(
        &self,
        session: &SessionId,
        response: RegistrationResponse,
        document: &str,
    ) -> Result<(Shipment, serde_json::Value, StagedFile)> {
        let shipment = response.into_shipment(
            &self.config.staging.client_acronym,
            (self.today)(),
            document,
        )?;
        let payload = shipment.payload()?;

        self.sink.emit(session, Event::loader(GENERATING_MESSAGE));
        let file = self.stage(&shipment).await?;
        Ok((shipment, payload, file))
    }

    /// Encode the shipment's single-recipient batch and write it to staging
    async fn stage(&self, shipment: &Shipment) -> Result<StagedFile> {
        let payload = encode_batch(
            shipment.context.clone(),
            BatchContract::default(),
            [shipment.recipient.clone()],
        )?;
        let file_name = staged_file_name(
            &shipment.context.client_acronym,
            shipment.context.created_on,
            shipment.context.shipment,
        );
        let file = StagedFile::write(&self.config.staging.directory, file_name, &payload).await?;

        tracing::info!(
            path = %file.path.display(),
            size = %crate::utils::format_bytes(payload.len() as u64),
            "AR batch staged"
        );
        Ok(file)
    }
}

/// Text shown to the user for a registration failure
fn registration_message(error: &Error) -> String {
    match error {
        Error::Registration(RegistrationError::Rejected { message, .. }) => message.clone(),
        Error::Registration(RegistrationError::TokenUnavailable(_)) => {
            "Could not obtain the access token.".to_string()
        }
        other => other.to_string(),
    }
}
