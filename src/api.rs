//! An HTTP client for the OFREP bulk evaluation endpoint.
use url::Url;

use crate::{
    flag::{BulkEvaluationRequest, BulkEvaluationResponse},
    transport::{HttpRequest, HttpResponse, HttpTransport},
    EvaluatedFlag, EvaluationContext, Error, Result,
};

const BULK_EVALUATION_PATH: [&str; 4] = ["ofrep", "v1", "evaluate", "flags"];

/// Outcome of a successful bulk evaluation round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkEvaluation {
    /// The server evaluated all flags for the context.
    Updated(Vec<EvaluatedFlag>),
    /// The server answered `304 Not Modified`: flags have not changed since the last call.
    NotModified,
}

/// A client that evaluates all flags for a context in a single request.
///
/// It remembers the `ETag` of the last response and sends it back as `If-None-Match`, so the
/// server can answer cheaply when nothing changed.
pub struct OfrepApi {
    transport: Box<dyn HttpTransport + Send + Sync>,
    url: Url,
    headers: Vec<(String, String)>,
    etag: Option<String>,
}

impl OfrepApi {
    /// Create a client for the server at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBaseUrl`] if `endpoint` is not a valid base URL.
    pub fn new(
        endpoint: &str,
        headers: Vec<(String, String)>,
        transport: Box<dyn HttpTransport + Send + Sync>,
    ) -> Result<OfrepApi> {
        Ok(OfrepApi {
            transport,
            url: bulk_evaluation_url(endpoint)?,
            headers,
            etag: None,
        })
    }

    /// Validator of the last successful response, if any.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Put back a validator, used when the response it came with has been discarded.
    pub(crate) fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }

    /// Evaluate all flags for `context`.
    ///
    /// The context is validated locally first: no request is sent if it is missing
    /// ([`Error::InvalidContext`]) or has an empty targeting key
    /// ([`Error::TargetingKeyMissing`]).
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`], [`Error::Forbidden`] for `401` and `403` responses.
    /// - [`Error::TooManyRequests`] for `429` responses. It carries the `Retry-After` header.
    /// - [`Error::Unmarshal`] if the response body is not valid JSON.
    /// - An error mapped from the `errorCode` of an application-level error response.
    /// - [`Error::UnexpectedResponse`] for any other status.
    /// - [`Error::Network`] if the request could not be sent.
    pub fn post_bulk_evaluate_flags(
        &mut self,
        context: Option<&EvaluationContext>,
    ) -> Result<BulkEvaluation> {
        let context = context
            .ok_or_else(|| Error::InvalidContext("evaluation context is missing".to_owned()))?;
        if context.targeting_key().is_empty() {
            return Err(Error::TargetingKeyMissing);
        }

        let body = serde_json::to_vec(&BulkEvaluationRequest {
            context: context.to_wire(),
        })?;

        let mut headers = Vec::with_capacity(self.headers.len() + 2);
        headers.push(("Content-Type".to_owned(), "application/json".to_owned()));
        headers.extend(self.headers.iter().cloned());
        if let Some(etag) = &self.etag {
            headers.push(("If-None-Match".to_owned(), etag.clone()));
        }

        log::debug!(target: "ofrep", targeting_key = context.targeting_key(); "sending bulk evaluation request");
        let response = self.transport.post(HttpRequest {
            url: self.url.clone(),
            headers,
            body,
        })?;

        self.handle_response(response)
    }

    fn handle_response(&mut self, response: HttpResponse) -> Result<BulkEvaluation> {
        match response.status {
            401 => {
                log::warn!(target: "ofrep", "client is not authorized. Check your API key");
                Err(Error::Unauthorized)
            }
            403 => {
                log::warn!(target: "ofrep", "client is forbidden to evaluate flags. Check your API key");
                Err(Error::Forbidden)
            }
            429 => Err(Error::TooManyRequests {
                retry_after: response.header("Retry-After").map(str::to_owned),
            }),
            304 => {
                log::debug!(target: "ofrep", "flags have not changed since last evaluation");
                Ok(BulkEvaluation::NotModified)
            }
            status @ (200..=299 | 400) => {
                let envelope: BulkEvaluationResponse = serde_json::from_slice(&response.body)?;

                if let Some(code) = envelope.error_code {
                    // Not tied to a single flag, so a FLAG_NOT_FOUND names what the server said.
                    let details = envelope.error_details.as_deref();
                    return Err(Error::from_code(
                        code,
                        details.unwrap_or("bulk evaluation"),
                        details,
                    ));
                }
                if status == 400 {
                    return Err(Error::General(
                        envelope
                            .error_details
                            .unwrap_or_else(|| "bad request".to_owned()),
                    ));
                }

                if let Some(etag) = response.header("ETag") {
                    self.etag = Some(etag.to_owned());
                }

                let flags = envelope.flags.unwrap_or_default();
                log::debug!(target: "ofrep", flag_count = flags.len(); "successfully evaluated flags");
                Ok(BulkEvaluation::Updated(flags))
            }
            status => {
                log::warn!(target: "ofrep", "received unexpected response while evaluating flags: {}", status);
                Err(Error::UnexpectedResponse {
                    status,
                    body: String::from_utf8_lossy(&response.body).into_owned(),
                })
            }
        }
    }
}

/// Append the bulk evaluation path to the endpoint, keeping any path prefix it already has.
fn bulk_evaluation_url(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(Error::InvalidBaseUrl)?;
    url.path_segments_mut()
        .map_err(|()| Error::InvalidBaseUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(BULK_EVALUATION_PATH);
    Ok(url)
}
