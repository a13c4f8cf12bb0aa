// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * resource.rs - Types relating to CoAP resource management.
 */

//! Resources served by a [CoapContext](crate::CoapContext).
//!
//! Request bodies that arrive in blocks are reassembled before they reach a resource handler,
//! and response bodies that do not fit into a single message are split up after the handler
//! returned. Handlers therefore always see complete bodies (unless the session's block mode
//! says otherwise).

use std::{
    any::Any,
    fmt::{Debug, Formatter},
};

use log::debug;

use crate::{
    message::{CoapMessage, CoapMessageCommon},
    protocol::{CoapRequestCode, CoapResponseCode},
    session::CoapSession,
};

pub type CoapResourceId = usize;

/// Reference to a resource within a [CoapResourceRegistry].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CoapResourceHandle {
    pub(crate) id: CoapResourceId,
    pub(crate) unknown: bool,
}

impl CoapResourceHandle {
    pub fn new(id: CoapResourceId, unknown: bool) -> CoapResourceHandle {
        CoapResourceHandle { id, unknown }
    }

    pub fn id(&self) -> CoapResourceId {
        self.id
    }

    /// Whether this is the catch-all resource for paths without a resource of their own.
    pub fn is_unknown(&self) -> bool {
        self.unknown
    }
}

/// Resource lookup and request dispatch, as seen by the block-wise transfer engine.
pub trait CoapResourceRegistry: Debug {
    /// Finds the resource responsible for a request with the given method and path.
    fn resolve(&self, method: CoapRequestCode, path: &str) -> Option<CoapResourceHandle>;

    /// Lets the resource handle a (complete) request.
    ///
    /// `response` is pre-filled with type, message ID, token and the code 2.05 Content.
    fn dispatch(
        &mut self,
        resource: CoapResourceHandle,
        session: &CoapSession,
        request: &CoapMessage,
        response: &mut CoapMessage,
    );
}

/// Trait with functions relating to [CoapResource]s with an unknown data type.
pub trait UntypedCoapResource: Any + Debug {
    /// Returns the uri_path this resource responds to.
    fn uri_path(&self) -> &str;
    /// Provides a reference to this resource as an [Any] trait object.
    ///
    /// You can use the resulting [Any] reference to downcast the resource to its appropriate
    /// concrete type (if you wish to e.g. change the application data).
    fn as_any(&self) -> &dyn Any;
    /// Mutable variant of [as_any()](UntypedCoapResource::as_any()).
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Returns whether a handler for the given method is set.
    fn has_handler(&self, method: CoapRequestCode) -> bool;
    /// Calls the handler for the method of `request`, responding with 4.05 if there is none.
    fn handle(&mut self, session: &CoapSession, request: &CoapMessage, response: &mut CoapMessage);
}

/// Representation of a CoapResource that can be requested from a server.
#[derive(Debug)]
pub struct CoapResource<D: Any + Debug> {
    uri_path: String,
    user_data: D,
    handlers: CoapResourceHandlers<D>,
}

/// Container for resource handlers for various CoAP methods.
#[derive(Debug)]
struct CoapResourceHandlers<D: Any + Debug> {
    get: Option<CoapRequestHandler<D>>,
    put: Option<CoapRequestHandler<D>>,
    delete: Option<CoapRequestHandler<D>>,
    post: Option<CoapRequestHandler<D>>,
    fetch: Option<CoapRequestHandler<D>>,
    ipatch: Option<CoapRequestHandler<D>>,
    patch: Option<CoapRequestHandler<D>>,
}

impl<D: Any + Debug> Default for CoapResourceHandlers<D> {
    fn default() -> Self {
        CoapResourceHandlers {
            get: None,
            put: None,
            delete: None,
            post: None,
            fetch: None,
            ipatch: None,
            patch: None,
        }
    }
}

impl<D: Any + Debug> CoapResourceHandlers<D> {
    #[inline]
    fn handler_ref(&self, code: CoapRequestCode) -> &Option<CoapRequestHandler<D>> {
        match code {
            CoapRequestCode::Get => &self.get,
            CoapRequestCode::Put => &self.put,
            CoapRequestCode::Delete => &self.delete,
            CoapRequestCode::Post => &self.post,
            CoapRequestCode::Fetch => &self.fetch,
            CoapRequestCode::IPatch => &self.ipatch,
            CoapRequestCode::Patch => &self.patch,
        }
    }

    #[inline]
    fn handler_ref_mut(&mut self, code: CoapRequestCode) -> &mut Option<CoapRequestHandler<D>> {
        match code {
            CoapRequestCode::Get => &mut self.get,
            CoapRequestCode::Put => &mut self.put,
            CoapRequestCode::Delete => &mut self.delete,
            CoapRequestCode::Post => &mut self.post,
            CoapRequestCode::Fetch => &mut self.fetch,
            CoapRequestCode::IPatch => &mut self.ipatch,
            CoapRequestCode::Patch => &mut self.patch,
        }
    }
}

impl<D: Any + Debug> CoapResource<D> {
    /// Creates a new CoapResource for the given `uri_path`.
    ///
    /// Handlers that are associated with this resource get a mutable reference to the provided
    /// `user_data` value as their first argument.
    pub fn new(uri_path: &str, user_data: D) -> CoapResource<D> {
        CoapResource {
            uri_path: uri_path.trim_matches('/').to_string(),
            user_data,
            handlers: CoapResourceHandlers::default(),
        }
    }

    /// Returns the user data associated with this resource.
    pub fn user_data(&self) -> &D {
        &self.user_data
    }

    pub fn user_data_mut(&mut self) -> &mut D {
        &mut self.user_data
    }

    /// Sets the handler function for a given method code.
    pub fn set_method_handler<H: Into<CoapRequestHandler<D>>>(&mut self, code: CoapRequestCode, handler: Option<H>) {
        *self.handlers.handler_ref_mut(code) = handler.map(|v| v.into());
    }
}

impl<D: Any + Debug> UntypedCoapResource for CoapResource<D> {
    fn uri_path(&self) -> &str {
        &self.uri_path
    }

    fn as_any(&self) -> &dyn Any {
        self as &dyn Any
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self as &mut dyn Any
    }

    fn has_handler(&self, method: CoapRequestCode) -> bool {
        self.handlers.handler_ref(method).is_some()
    }

    fn handle(&mut self, session: &CoapSession, request: &CoapMessage, response: &mut CoapMessage) {
        let handler = request
            .request_code()
            .and_then(|code| self.handlers.handler_ref_mut(code).as_mut());
        match handler {
            Some(handler) => (handler.handler_function)(&mut self.user_data, session, request, response),
            None => response.set_code(CoapResponseCode::NotAllowed),
        }
    }
}

/// Handler function for requests to a [CoapResource].
pub struct CoapRequestHandler<D: Any + Debug> {
    handler_function: Box<dyn FnMut(&mut D, &CoapSession, &CoapMessage, &mut CoapMessage)>,
}

impl<D: Any + Debug> CoapRequestHandler<D> {
    /// Creates a new CoapRequestHandler with the given function as the handler function to call.
    pub fn new<F: 'static + FnMut(&mut D, &CoapSession, &CoapMessage, &mut CoapMessage)>(
        handler: F,
    ) -> CoapRequestHandler<D> {
        CoapRequestHandler {
            handler_function: Box::new(handler),
        }
    }
}

impl<D: Any + Debug, F: 'static + FnMut(&mut D, &CoapSession, &CoapMessage, &mut CoapMessage)> From<F>
    for CoapRequestHandler<D>
{
    fn from(f: F) -> Self {
        CoapRequestHandler::new(f)
    }
}

impl<D: Any + Debug> Debug for CoapRequestHandler<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoapRequestHandler").finish()
    }
}

/// The default [CoapResourceRegistry]: resources identified by their path, plus an optional
/// catch-all resource for all other paths.
#[derive(Debug, Default)]
pub struct CoapResourceTable {
    resources: Vec<Box<dyn UntypedCoapResource>>,
    unknown: Option<Box<dyn UntypedCoapResource>>,
}

impl CoapResourceTable {
    pub fn new() -> CoapResourceTable {
        CoapResourceTable::default()
    }

    /// Adds a resource, replacing any previous resource with the same path.
    pub fn add_resource<D: Any + Debug>(&mut self, resource: CoapResource<D>) -> CoapResourceHandle {
        let position = self
            .resources
            .iter()
            .position(|existing| existing.uri_path() == resource.uri_path());
        let id = match position {
            Some(id) => {
                self.resources[id] = Box::new(resource);
                id
            },
            None => {
                self.resources.push(Box::new(resource));
                self.resources.len() - 1
            },
        };
        CoapResourceHandle::new(id, false)
    }

    /// Sets the resource that handles requests to paths without a resource of their own.
    pub fn set_unknown_resource<D: Any + Debug>(&mut self, resource: CoapResource<D>) -> CoapResourceHandle {
        self.unknown = Some(Box::new(resource));
        CoapResourceHandle::new(0, true)
    }

    pub fn resource(&self, handle: CoapResourceHandle) -> Option<&dyn UntypedCoapResource> {
        match handle.unknown {
            true => self.unknown.as_deref(),
            false => self.resources.get(handle.id).map(|resource| resource.as_ref()),
        }
    }

    pub fn resource_mut(&mut self, handle: CoapResourceHandle) -> Option<&mut dyn UntypedCoapResource> {
        match handle.unknown {
            true => self.unknown.as_deref_mut(),
            false => self.resources.get_mut(handle.id).map(|resource| resource.as_mut()),
        }
    }
}

impl CoapResourceRegistry for CoapResourceTable {
    fn resolve(&self, method: CoapRequestCode, path: &str) -> Option<CoapResourceHandle> {
        let path = path.trim_matches('/');
        if let Some(id) = self.resources.iter().position(|resource| resource.uri_path() == path) {
            return Some(CoapResourceHandle::new(id, false));
        }
        self.unknown
            .as_ref()
            .filter(|unknown| unknown.has_handler(method))
            .map(|_| CoapResourceHandle::new(0, true))
    }

    fn dispatch(
        &mut self,
        resource: CoapResourceHandle,
        session: &CoapSession,
        request: &CoapMessage,
        response: &mut CoapMessage,
    ) {
        match self.resource_mut(resource) {
            Some(resource) => resource.handle(session, request, response),
            None => {
                debug!("request dispatched to unknown resource handle {:?}", resource);
                response.set_code(CoapResponseCode::NotFound);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CoapSessionConfig,
        protocol::{CoapMessageCode, CoapMessageType},
        types::CoapProtocol,
    };

    #[test]
    fn dispatch_to_method_handler() {
        let session = CoapSession::new(1, CoapProtocol::Udp, CoapSessionConfig::default());
        let mut table = CoapResourceTable::new();
        let mut resource = CoapResource::new("/counter", 0u32);
        resource.set_method_handler(
            CoapRequestCode::Post,
            Some(|count: &mut u32, _: &CoapSession, _: &CoapMessage, rsp: &mut CoapMessage| {
                *count += 1;
                rsp.set_code(CoapResponseCode::Changed);
            }),
        );
        let handle = table.add_resource(resource);
        assert_eq!(table.resolve(CoapRequestCode::Post, "counter"), Some(handle));
        assert_eq!(table.resolve(CoapRequestCode::Post, "other"), None);

        let request = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Post);
        let mut response = CoapMessage::new(CoapMessageType::Ack, CoapResponseCode::Content);
        table.dispatch(handle, &session, &request, &mut response);
        assert_eq!(response.code(), CoapMessageCode::from(CoapResponseCode::Changed));

        let request = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Get);
        let mut response = CoapMessage::new(CoapMessageType::Ack, CoapResponseCode::Content);
        table.dispatch(handle, &session, &request, &mut response);
        assert_eq!(response.code(), CoapMessageCode::from(CoapResponseCode::NotAllowed));

        let resource = table.resource(handle).unwrap();
        let resource = resource.as_any().downcast_ref::<CoapResource<u32>>().unwrap();
        assert_eq!(*resource.user_data(), 1);
    }

    #[test]
    fn unknown_resource_only_for_handled_methods() {
        let mut table = CoapResourceTable::new();
        let mut unknown = CoapResource::new("", ());
        unknown.set_method_handler(
            CoapRequestCode::Put,
            Some(|_: &mut (), _: &CoapSession, _: &CoapMessage, rsp: &mut CoapMessage| {
                rsp.set_code(CoapResponseCode::Created);
            }),
        );
        let handle = table.set_unknown_resource(unknown);
        assert!(handle.is_unknown());
        assert_eq!(table.resolve(CoapRequestCode::Put, "some/new/path"), Some(handle));
        assert_eq!(table.resolve(CoapRequestCode::Get, "some/new/path"), None);
    }
}
