//! Configuration for the stretch gesture.
//!
//! The config is a KDL document with a single `stretch` section. Every child is optional and
//! falls back to the values shipped in `resources/default-config.kdl`.

#[macro_use]
extern crate tracing;

use std::ffi::OsStr;
use std::path::Path;

use knuffel::errors::DecodeError;
use miette::{Context, IntoDiagnostic};

/// Exponent of the damping curve.
pub const DEFAULT_EXPONENT: f64 = 0.88;
/// 200 px every 14 ms.
pub const DEFAULT_UNSTRETCH_SPEED: f64 = 200. / 0.014;
pub const DEFAULT_ANIMATION_TIMEOUT_MS: u32 = 800;
pub const DEFAULT_FRAME_INTERVAL_MS: u32 = 14;

#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq)]
pub struct Config {
    #[knuffel(child, default)]
    pub stretch: Stretch,
}

#[derive(knuffel::Decode, Debug, Clone, Copy, PartialEq)]
pub struct Stretch {
    #[knuffel(child, unwrap(argument), default = Self::default().exponent)]
    pub exponent: StretchExponent,
    /// Spring-back velocity in logical pixels per second.
    #[knuffel(child, unwrap(argument), default = Self::default().unstretch_speed)]
    pub unstretch_speed: FloatOrInt<1, 10_000_000>,
    /// Hard cap on the spring-back duration.
    #[knuffel(child, unwrap(argument), default = Self::default().animation_timeout_ms)]
    pub animation_timeout_ms: u32,
    /// Minimum time between two spring-back ticks.
    #[knuffel(child, unwrap(argument), default = Self::default().frame_interval_ms)]
    pub frame_interval_ms: u32,
    /// Skip the spring-back and end released gestures right away.
    #[knuffel(child)]
    pub off: bool,
}

impl Default for Stretch {
    fn default() -> Self {
        Self {
            exponent: StretchExponent(DEFAULT_EXPONENT),
            unstretch_speed: FloatOrInt(DEFAULT_UNSTRETCH_SPEED),
            animation_timeout_ms: DEFAULT_ANIMATION_TIMEOUT_MS,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            off: false,
        }
    }
}

/// Damping exponent, strictly between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchExponent(pub f64);

impl Default for StretchExponent {
    fn default() -> Self {
        Self(DEFAULT_EXPONENT)
    }
}

/// A number that may be written either as an integer or as a float, within `MIN..=MAX`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FloatOrInt<const MIN: i32, const MAX: i32>(pub f64);

impl Config {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("error reading {path:?}"))?;

        let config = Self::parse(
            path.file_name()
                .and_then(OsStr::to_str)
                .unwrap_or("config.kdl"),
            &contents,
        )
        .context("error parsing")?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    pub fn parse(filename: &str, text: &str) -> Result<Self, knuffel::Error> {
        let _span = tracy_client::span!("Config::parse");
        knuffel::parse(filename, text)
    }
}

fn check_no_type_name<S: knuffel::traits::ErrorSpan>(
    type_name: &Option<knuffel::span::Spanned<knuffel::ast::TypeName, S>>,
    ctx: &mut knuffel::decode::Context<S>,
) {
    if let Some(type_name) = &type_name {
        ctx.emit_error(DecodeError::unexpected(
            type_name,
            "type name",
            "no type name expected for this node",
        ));
    }
}

impl<S: knuffel::traits::ErrorSpan, const MIN: i32, const MAX: i32> knuffel::DecodeScalar<S>
    for FloatOrInt<MIN, MAX>
{
    fn type_check(
        type_name: &Option<knuffel::span::Spanned<knuffel::ast::TypeName, S>>,
        ctx: &mut knuffel::decode::Context<S>,
    ) {
        check_no_type_name(type_name, ctx);
    }

    fn raw_decode(
        val: &knuffel::span::Spanned<knuffel::ast::Literal, S>,
        ctx: &mut knuffel::decode::Context<S>,
    ) -> Result<Self, DecodeError<S>> {
        let value = match &**val {
            knuffel::ast::Literal::Int(ref value) => match i32::try_from(value) {
                Ok(v) => f64::from(v),
                Err(err) => {
                    ctx.emit_error(DecodeError::conversion(val, err));
                    return Ok(Self::default());
                }
            },
            knuffel::ast::Literal::Decimal(ref value) => match f64::try_from(value) {
                Ok(v) => v,
                Err(err) => {
                    ctx.emit_error(DecodeError::conversion(val, err));
                    return Ok(Self::default());
                }
            },
            _ => {
                ctx.emit_error(DecodeError::unsupported(
                    val,
                    "unsupported value, only numbers are recognized",
                ));
                return Ok(Self::default());
            }
        };

        if !(f64::from(MIN)..=f64::from(MAX)).contains(&value) {
            ctx.emit_error(DecodeError::conversion(
                val,
                format!("value must be between {MIN} and {MAX}"),
            ));
            return Ok(Self::default());
        }

        Ok(Self(value))
    }
}

impl<S: knuffel::traits::ErrorSpan> knuffel::DecodeScalar<S> for StretchExponent {
    fn type_check(
        type_name: &Option<knuffel::span::Spanned<knuffel::ast::TypeName, S>>,
        ctx: &mut knuffel::decode::Context<S>,
    ) {
        check_no_type_name(type_name, ctx);
    }

    fn raw_decode(
        val: &knuffel::span::Spanned<knuffel::ast::Literal, S>,
        ctx: &mut knuffel::decode::Context<S>,
    ) -> Result<Self, DecodeError<S>> {
        match &**val {
            knuffel::ast::Literal::Decimal(ref value) => match f64::try_from(value) {
                Ok(v) if v > 0. && v < 1. => Ok(Self(v)),
                Ok(_) => {
                    ctx.emit_error(DecodeError::conversion(
                        val,
                        "exponent must be greater than 0 and less than 1",
                    ));
                    Ok(Self::default())
                }
                Err(err) => {
                    ctx.emit_error(DecodeError::conversion(val, err));
                    Ok(Self::default())
                }
            },
            knuffel::ast::Literal::Int(_) => {
                ctx.emit_error(DecodeError::conversion(
                    val,
                    "exponent must be greater than 0 and less than 1",
                ));
                Ok(Self::default())
            }
            _ => {
                ctx.emit_error(DecodeError::unsupported(
                    val,
                    "unsupported value, only numbers are recognized",
                ));
                Ok(Self::default())
            }
        }
    }
}
