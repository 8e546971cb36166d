//! Parameter binding and outcome mapping.
//!
//! # Responsibilities
//! - Bind declared path/query/header/body parameters to an `Args` bag
//! - Convert handler outcomes (reply, problem, fault) into responses
//!
//! Binding failures are caller errors: they answer 400 (or 415) and the
//! connection stays open. Nothing thrown by or around a handler may get
//! past this boundary.

use crate::codec;
use crate::error::{BindingError, HandlerFault};
use crate::handler::reply::{Problem, Reply};
use crate::handler::{ArgValue, Args};
use crate::http::{RequestContext, Response};
use crate::route::{ParamSource, Route};

/// Bind the route's declared parameters from the request.
pub fn bind(route: &Route, ctx: &RequestContext) -> Result<Args, BindingError> {
    let mut args = Args::default();
    let mut query: Option<Vec<(String, String)>> = None;

    for spec in &route.params {
        match spec.source {
            ParamSource::Path => {
                // The matcher extracted every capture; absence here is a
                // compiler bug surfaced as a binding error, not a panic.
                match ctx.path_param(&spec.name) {
                    Some(value) => {
                        args.push(spec.name.clone(), ArgValue::Text(value.to_string()))
                    }
                    None => {
                        return Err(BindingError::Missing {
                            origin: "path",
                            name: spec.name.clone(),
                        })
                    }
                }
            }
            ParamSource::Query => {
                let query = query.get_or_insert_with(|| ctx.head.query_params());
                match query.iter().find(|(k, _)| *k == spec.name) {
                    Some((_, value)) => {
                        args.push(spec.name.clone(), ArgValue::Text(value.clone()))
                    }
                    None if spec.required => {
                        return Err(BindingError::Missing {
                            origin: "query",
                            name: spec.name.clone(),
                        })
                    }
                    None => {}
                }
            }
            ParamSource::Header => match ctx.head.header(&spec.name) {
                Some(value) => args.push(spec.name.clone(), ArgValue::Text(value.to_string())),
                None if spec.required => {
                    return Err(BindingError::Missing {
                        origin: "header",
                        name: spec.name.clone(),
                    })
                }
                None => {}
            },
            ParamSource::Body => {
                if ctx.body.is_empty() {
                    if spec.required {
                        return Err(BindingError::Missing {
                            origin: "body",
                            name: spec.name.clone(),
                        });
                    }
                    continue;
                }
                let content_type = ctx.head.header("content-type").unwrap_or("");
                if !codec::is_json(content_type) {
                    return Err(BindingError::UnsupportedContentType(
                        content_type.to_string(),
                    ));
                }
                let value = codec::decode_json(&ctx.body)
                    .map_err(|e| BindingError::Body(e.to_string()))?;
                args.push(spec.name.clone(), ArgValue::Json(value));
            }
        }
    }

    Ok(args)
}

/// Encode a successful reply per the route's declared content type.
pub fn encode_reply(route: &Route, reply: Reply) -> Result<Response, HandlerFault> {
    let (status, payload) = reply.into_parts();
    let encoded = codec::encode(&payload, &route.produces)
        .map_err(|e| HandlerFault::EncodeFailed(e.to_string()))?;
    Ok(match encoded {
        None => Response::new(status),
        Some((bytes, content_type)) => Response::new(status).with_body(&content_type, bytes),
    })
}

/// A declared error mapping becomes a response with its own status.
pub fn problem_response(problem: &Problem) -> Response {
    Response::error_json(problem.status(), problem.detail())
}

/// Faults collapse to their status with a generic body; the detail stays
/// in the logs, not on the wire.
pub fn fault_response(fault: &HandlerFault) -> Response {
    let detail = match fault {
        HandlerFault::Timeout(_) => "handler timed out",
        _ => "internal server error",
    };
    Response::error_json(fault.status(), detail)
}

pub fn binding_response(err: &BindingError) -> Response {
    Response::error_json(err.status(), &err.to_string())
}
