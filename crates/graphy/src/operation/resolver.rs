//! Type erasure of resolver functions.
//!
//! Resolvers are plain async functions or closures taking a [`Context`] followed by up to
//! eight arguments. Every argument is parsed, and validated, before the function is called.

use std::{future::Future, marker::PhantomData};

use futures::{future::BoxFuture, stream::BoxStream, FutureExt, Stream, StreamExt};

use crate::{
    types::{InputContext, InputType, InputValue, OutputType, Resolved, TypeRef},
    Context, Error,
};

pub(crate) type ResolverFuture = BoxFuture<'static, Result<Resolved, Error>>;
pub(crate) type ResolverStream = BoxStream<'static, Resolved>;
pub(crate) type StreamFuture = BoxFuture<'static, Result<ResolverStream, Error>>;

/// Parameter and output types of a resolver, the [`Context`] excluded.
#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Vec<TypeRef>,
    pub output: TypeRef,
}

/// Functions usable as query and mutation resolvers.
pub trait IntoResolver<Args>: Send + Sync + 'static {
    #[doc(hidden)]
    fn signature() -> Signature;

    #[doc(hidden)]
    fn call(&self, ctx: Context, args: Vec<InputValue>, cx: &InputContext<'_>) -> Result<ResolverFuture, Error>;
}

/// Functions usable as subscription resolvers. They return a stream of values.
pub trait IntoSubscriptionResolver<Args>: Send + Sync + 'static {
    #[doc(hidden)]
    fn signature() -> Signature;

    #[doc(hidden)]
    fn call(&self, ctx: Context, args: Vec<InputValue>, cx: &InputContext<'_>) -> Result<StreamFuture, Error>;
}

macro_rules! impl_into_resolver {
    ($($arg:ident),*) => {
        impl<F, Fut, R, E, $($arg,)*> IntoResolver<($($arg,)*)> for F
        where
            F: Fn(Context, $($arg),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<R, E>> + Send + 'static,
            R: OutputType,
            E: Into<Error>,
            $($arg: InputType,)*
        {
            fn signature() -> Signature {
                Signature {
                    params: vec![$(<$arg as InputType>::type_ref()),*],
                    output: <R as OutputType>::type_ref(),
                }
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, ctx: Context, args: Vec<InputValue>, cx: &InputContext<'_>) -> Result<ResolverFuture, Error> {
                let mut args = args.into_iter();
                $(let $arg = <$arg as InputType>::parse(args.next().unwrap_or(InputValue::Absent), cx)?;)*
                let future = (self)(ctx, $($arg),*);
                Ok(async move { future.await.map(|value| value.resolve()).map_err(Into::into) }.boxed())
            }
        }

        impl<F, Fut, S, R, E, $($arg,)*> IntoSubscriptionResolver<($($arg,)*)> for F
        where
            F: Fn(Context, $($arg),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<S, E>> + Send + 'static,
            S: Stream<Item = R> + Send + 'static,
            R: OutputType,
            E: Into<Error>,
            $($arg: InputType,)*
        {
            fn signature() -> Signature {
                Signature {
                    params: vec![$(<$arg as InputType>::type_ref()),*],
                    output: <R as OutputType>::type_ref(),
                }
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, ctx: Context, args: Vec<InputValue>, cx: &InputContext<'_>) -> Result<StreamFuture, Error> {
                let mut args = args.into_iter();
                $(let $arg = <$arg as InputType>::parse(args.next().unwrap_or(InputValue::Absent), cx)?;)*
                let future = (self)(ctx, $($arg),*);
                Ok(async move {
                    let stream = future.await.map_err(Into::into)?;
                    Ok(stream.map(|item| item.resolve()).boxed())
                }
                .boxed())
            }
        }
    };
}

impl_into_resolver!();
impl_into_resolver!(A1);
impl_into_resolver!(A1, A2);
impl_into_resolver!(A1, A2, A3);
impl_into_resolver!(A1, A2, A3, A4);
impl_into_resolver!(A1, A2, A3, A4, A5);
impl_into_resolver!(A1, A2, A3, A4, A5, A6);
impl_into_resolver!(A1, A2, A3, A4, A5, A6, A7);
impl_into_resolver!(A1, A2, A3, A4, A5, A6, A7, A8);

pub(crate) trait ErasedResolver: Send + Sync {
    fn call(&self, ctx: Context, args: Vec<InputValue>, cx: &InputContext<'_>) -> Result<ResolverFuture, Error>;
}

pub(crate) trait ErasedSubscriptionResolver: Send + Sync {
    fn call(&self, ctx: Context, args: Vec<InputValue>, cx: &InputContext<'_>) -> Result<StreamFuture, Error>;
}

pub(crate) struct FnResolver<F, Args> {
    f: F,
    _args: PhantomData<fn() -> Args>,
}

impl<F, Args> FnResolver<F, Args> {
    pub(crate) fn new(f: F) -> Self {
        FnResolver { f, _args: PhantomData }
    }
}

impl<F: IntoResolver<Args>, Args> ErasedResolver for FnResolver<F, Args> {
    fn call(&self, ctx: Context, args: Vec<InputValue>, cx: &InputContext<'_>) -> Result<ResolverFuture, Error> {
        self.f.call(ctx, args, cx)
    }
}

impl<F: IntoSubscriptionResolver<Args>, Args> ErasedSubscriptionResolver for FnResolver<F, Args> {
    fn call(&self, ctx: Context, args: Vec<InputValue>, cx: &InputContext<'_>) -> Result<StreamFuture, Error> {
        self.f.call(ctx, args, cx)
    }
}
