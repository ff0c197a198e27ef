//! Command and postback routing with typed arguments.
//!
//! A command handler runs for text messages that start with the command
//! name. Whatever follows the name (minus one separating space) is split on
//! `;` and coerced into the handler's parameters:
//!
//! ```rust,ignore
//! // "/add 3;4" → add(ctx, 3, 4)
//! registry.command("/add", |ctx: Arc<TextMessageContext>, a: i64, b: i64| async move {
//!     format!("{}", a + b)
//! })?;
//!
//! // "/say hello;world" → say(ctx, Rest("hello;world"))
//! registry.command("/say", |ctx: Arc<TextMessageContext>, text: Rest| async move {
//!     text.0
//! })?;
//! ```
//!
//! Postback routes work the same way on postback data built with
//! [`postback_data`]. Parameter types are limited to those implementing the
//! sealed [`FromArg`] trait: `String`, `i64`, `f64`, `bool` and [`Rest`].

use std::fmt::{self, Display};
use std::sync::Arc;

use futures::future::BoxFuture;
use linex_core::context::{PostbackContext, TextMessageContext};
use linex_core::{Context, EventContext};
use tracing::{trace, warn};

use crate::error::{ArgError, ArgResult, HandlerResult};
use crate::handler::{BoxedHandler, HandlerResponse};

// ============================================================================
// Argument coercion
// ============================================================================

mod sealed {
    pub trait Sealed {}

    impl Sealed for String {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
    impl Sealed for bool {}
    impl Sealed for super::Rest {}
}

/// All remaining segments, re-joined with `;`.
///
/// Must be the last parameter. Registering a handler with `Rest` anywhere
/// else fails with [`RegistrationError::MisplacedRest`].
///
/// [`RegistrationError::MisplacedRest`]: crate::RegistrationError::MisplacedRest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rest(pub String);

impl Rest {
    /// Returns the joined text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Rest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads positional segments for parameter coercion.
#[derive(Debug)]
pub struct ArgCursor<'a> {
    parts: &'a [String],
    index: usize,
}

impl<'a> ArgCursor<'a> {
    /// Creates a cursor at the first segment.
    pub fn new(parts: &'a [String]) -> Self {
        Self { parts, index: 0 }
    }

    fn next(&mut self) -> ArgResult<(usize, &'a str)> {
        let index = self.index;
        let part = self
            .parts
            .get(index)
            .ok_or(ArgError::Missing { index })?;
        self.index += 1;
        Ok((index, part.as_str()))
    }

    fn rest(&mut self) -> String {
        let rest = self.parts.get(self.index..).unwrap_or_default().join(";");
        self.index = self.parts.len();
        rest
    }

    /// Fails if segments are left over.
    pub fn finish(self) -> ArgResult<()> {
        match self.parts.len().saturating_sub(self.index) {
            0 => Ok(()),
            count => Err(ArgError::Unexpected { count }),
        }
    }
}

/// Parameter types a command or postback handler may take.
pub trait FromArg: sealed::Sealed + Sized {
    /// Whether this parameter consumes every remaining segment.
    const IS_REST: bool = false;

    /// Consumes segments from the cursor.
    fn from_arg(cursor: &mut ArgCursor<'_>) -> ArgResult<Self>;
}

impl FromArg for String {
    fn from_arg(cursor: &mut ArgCursor<'_>) -> ArgResult<Self> {
        cursor.next().map(|(_, part)| part.to_string())
    }
}

fn parse_with<T>(
    cursor: &mut ArgCursor<'_>,
    expected: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> ArgResult<T> {
    let (index, part) = cursor.next()?;
    parse(part.trim()).ok_or_else(|| ArgError::Invalid {
        index,
        value: part.to_string(),
        expected,
    })
}

impl FromArg for i64 {
    fn from_arg(cursor: &mut ArgCursor<'_>) -> ArgResult<Self> {
        parse_with(cursor, "integer", |s| s.parse().ok())
    }
}

impl FromArg for f64 {
    fn from_arg(cursor: &mut ArgCursor<'_>) -> ArgResult<Self> {
        parse_with(cursor, "number", |s| s.parse().ok())
    }
}

impl FromArg for bool {
    fn from_arg(cursor: &mut ArgCursor<'_>) -> ArgResult<Self> {
        parse_with(cursor, "boolean", |s| match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        })
    }
}

impl FromArg for Rest {
    const IS_REST: bool = true;

    fn from_arg(cursor: &mut ArgCursor<'_>) -> ArgResult<Self> {
        Ok(Rest(cursor.rest()))
    }
}

// ============================================================================
// ArgsHandler
// ============================================================================

/// A handler taking a typed context followed by coerced arguments.
///
/// Implemented for async functions `(Arc<C>, A1, .., An)` with up to six
/// [`FromArg`] parameters.
pub trait ArgsHandler<C, T>: Clone + Send + Sync + 'static {
    /// Position of a [`Rest`] parameter that is not the last one.
    fn misplaced_rest() -> Option<usize>;

    /// Coerces `args` and returns the handler future, or the coercion error
    /// without calling the handler.
    fn bind(self, ctx: Arc<C>, args: &[String]) -> ArgResult<BoxFuture<'static, HandlerResult>>;
}

macro_rules! impl_args_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<F, Fut, Res, C, $($ty,)*> ArgsHandler<C, ($($ty,)*)> for F
        where
            F: FnOnce(Arc<C>, $($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: HandlerResponse,
            C: EventContext,
            $( $ty: FromArg + Send + 'static, )*
        {
            fn misplaced_rest() -> Option<usize> {
                let rest: &[bool] = &[$(<$ty as FromArg>::IS_REST,)*];
                let last = rest.len().saturating_sub(1);
                rest.iter().position(|&is_rest| is_rest).filter(|&index| index < last)
            }

            fn bind(
                self,
                ctx: Arc<C>,
                args: &[String],
            ) -> ArgResult<BoxFuture<'static, HandlerResult>> {
                let mut cursor = ArgCursor::new(args);
                $(
                    let $ty = $ty::from_arg(&mut cursor)?;
                )*
                cursor.finish()?;

                Ok(Box::pin(async move {
                    let context = Arc::clone(&ctx).wrap();
                    let res = (self)(ctx, $($ty,)*).await;
                    res.process_response(&context).await
                }))
            }
        }
    };
}

impl_args_handler!();
impl_args_handler!(A1);
impl_args_handler!(A1, A2);
impl_args_handler!(A1, A2, A3);
impl_args_handler!(A1, A2, A3, A4);
impl_args_handler!(A1, A2, A3, A4, A5);
impl_args_handler!(A1, A2, A3, A4, A5, A6);

// ============================================================================
// Matching
// ============================================================================

fn split_args(rest: &str) -> Vec<String> {
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(';').map(str::to_string).collect()
    }
}

/// Returns the argument segments if `text` invokes command `name`.
pub fn command_args(name: &str, text: &str) -> Option<Vec<String>> {
    let rest = text.strip_prefix(name)?;
    Some(split_args(rest.strip_prefix(' ').unwrap_or(rest)))
}

/// Returns the argument segments if `data` targets postback route `name`.
pub fn postback_args(name: &str, data: &str) -> Option<Vec<String>> {
    if data == name {
        return Some(Vec::new());
    }
    data.strip_prefix(name)?.strip_prefix(';').map(split_args)
}

/// Builds postback data for route `name`: `name;arg1;arg2`.
pub fn postback_data<I>(name: &str, args: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut data = name.to_string();
    for arg in args {
        data.push(';');
        data.push_str(&arg.to_string());
    }
    data
}

fn route<C, H, T>(
    kind: &'static str,
    name: String,
    handler: H,
    matches: fn(&str, &C) -> Option<Vec<String>>,
) -> BoxedHandler
where
    C: EventContext,
    H: ArgsHandler<C, T>,
    T: 'static,
{
    Arc::new(move |ctx: Context| -> BoxFuture<'static, HandlerResult> {
        let Some(typed) = C::extract(&ctx) else {
            return Box::pin(async { Ok(()) });
        };
        let Some(args) = matches(&name, &typed) else {
            return Box::pin(async { Ok(()) });
        };
        trace!(kind, name = %name, args = args.len(), "Route matched");

        match handler.clone().bind(typed, &args) {
            Ok(fut) => fut,
            Err(e) => {
                warn!(kind, name = %name, error = %e, "Invalid arguments, handler skipped");
                Box::pin(async { Ok(()) })
            }
        }
    })
}

/// Wraps a command handler into a `text` channel handler.
pub(crate) fn command_handler<H, T>(name: String, handler: H) -> BoxedHandler
where
    H: ArgsHandler<TextMessageContext, T>,
    T: 'static,
{
    route::<TextMessageContext, H, T>("command", name, handler, |name, ctx| {
        command_args(name, ctx.text())
    })
}

/// Wraps a postback handler into a `postback` channel handler.
pub(crate) fn postback_handler<H, T>(name: String, handler: H) -> BoxedHandler
where
    H: ArgsHandler<PostbackContext, T>,
    T: 'static,
{
    route::<PostbackContext, H, T>("postback", name, handler, |name, ctx| {
        postback_args(name, ctx.data())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_command_args() {
        assert_eq!(command_args("/add", "/add 1;2"), Some(parts(&["1", "2"])));
        assert_eq!(command_args("/add", "/add"), Some(vec![]));
        assert_eq!(command_args("/say", "/say  two spaces"), Some(parts(&[" two spaces"])));
        assert_eq!(command_args("/add", "add 1;2"), None);
    }

    #[test]
    fn test_postback_args() {
        assert_eq!(postback_args("buy", "buy;3;red"), Some(parts(&["3", "red"])));
        assert_eq!(postback_args("buy", "buy"), Some(vec![]));
        assert_eq!(postback_args("buy", "buyer;1"), None);
        assert_eq!(postback_args("buy", "sell;1"), None);
    }

    #[test]
    fn test_postback_data() {
        assert_eq!(postback_data("handling", [1, 2]), "handling;1;2");
        assert_eq!(postback_data("ping", Vec::<String>::new()), "ping");
        let data = postback_data("order", ["3", "blue"]);
        assert_eq!(postback_args("order", &data), Some(parts(&["3", "blue"])));
    }

    #[test]
    fn test_scalar_coercion() {
        let args = parts(&["42", "2.5", "Yes", "text"]);
        let mut cursor = ArgCursor::new(&args);

        assert_eq!(i64::from_arg(&mut cursor), Ok(42));
        assert_eq!(f64::from_arg(&mut cursor), Ok(2.5));
        assert_eq!(bool::from_arg(&mut cursor), Ok(true));
        assert_eq!(String::from_arg(&mut cursor), Ok("text".to_string()));
        assert_eq!(cursor.finish(), Ok(()));
    }

    #[test]
    fn test_coercion_errors() {
        let args = parts(&["x"]);
        let mut cursor = ArgCursor::new(&args);
        assert_eq!(
            i64::from_arg(&mut cursor),
            Err(ArgError::Invalid {
                index: 0,
                value: "x".to_string(),
                expected: "integer"
            })
        );
        assert_eq!(bool::from_arg(&mut cursor), Err(ArgError::Missing { index: 1 }));

        let args = parts(&["1", "2"]);
        let mut cursor = ArgCursor::new(&args);
        i64::from_arg(&mut cursor).unwrap();
        assert_eq!(cursor.finish(), Err(ArgError::Unexpected { count: 1 }));
    }

    #[test]
    fn test_rest_takes_everything() {
        let args = parts(&["a", "b", "c"]);
        let mut cursor = ArgCursor::new(&args);

        assert_eq!(String::from_arg(&mut cursor), Ok("a".to_string()));
        assert_eq!(Rest::from_arg(&mut cursor), Ok(Rest("b;c".to_string())));
        assert_eq!(cursor.finish(), Ok(()));

        let empty: Vec<String> = Vec::new();
        let mut cursor = ArgCursor::new(&empty);
        assert_eq!(Rest::from_arg(&mut cursor), Ok(Rest::default()));
    }

    fn misplaced<H, T>(_: H) -> Option<usize>
    where
        H: ArgsHandler<TextMessageContext, T>,
    {
        H::misplaced_rest()
    }

    #[test]
    fn test_rest_position() {
        assert_eq!(misplaced(|_: Arc<TextMessageContext>| async {}), None);
        assert_eq!(misplaced(|_: Arc<TextMessageContext>, _: Rest| async {}), None);
        assert_eq!(
            misplaced(|_: Arc<TextMessageContext>, _: i64, _: Rest| async {}),
            None
        );
        assert_eq!(
            misplaced(|_: Arc<TextMessageContext>, _: Rest, _: i64| async {}),
            Some(0)
        );
        assert_eq!(
            misplaced(|_: Arc<TextMessageContext>, _: String, _: Rest, _: Rest| async {}),
            Some(1)
        );
    }
}
