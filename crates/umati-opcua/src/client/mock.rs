// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scripted transport for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::client::transport::*;
use crate::error::OpcUaResult;
use crate::namespace::NamespaceCache;
use crate::types::{
    ids, AttributeId, BrowseDirection, StatusCode, UaNodeId, UaQualifiedName,
};

type BrowseKey = (UaNodeId, BrowseDirection, UaNodeId);

/// Answers browse and read requests from fixed tables.
///
/// Browse keys ignore `include_subtypes` and the masks; tests register the
/// exact pages they expect.
#[derive(Default)]
pub(crate) struct MockTransport {
    namespaces: Vec<String>,
    pages: HashMap<BrowseKey, Vec<Vec<ReferenceDescription>>>,
    browse_failures: HashMap<UaNodeId, StatusCode>,
    attributes: HashMap<(UaNodeId, AttributeId), Variant>,
    translations: HashMap<(UaNodeId, UaQualifiedName), BrowsePathResult>,
    browse_calls: AtomicU32,
    browse_next_calls: AtomicU32,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            namespaces: vec!["ns0".into(), "ns1".into()],
            ..Default::default()
        }
    }

    pub fn namespace_cache(&self) -> NamespaceCache {
        let mut cache = NamespaceCache::new();
        cache.replace(self.namespaces.clone());
        cache
    }

    pub fn object(ns: u16, id: u32, name: &str) -> ReferenceDescription {
        ReferenceDescription {
            node_id: UaNodeId::numeric(ns, id),
            browse_name: UaQualifiedName::new(ns, name),
            node_class: 1,
            type_definition: UaNodeId::numeric(0, ids::BASE_OBJECT_TYPE),
            reference_type: UaNodeId::numeric(0, ids::HAS_COMPONENT),
            is_forward: true,
            display_name: name.to_string(),
        }
    }

    pub fn add_pages(
        &mut self,
        node: UaNodeId,
        direction: BrowseDirection,
        reference_type: u32,
        pages: Vec<Vec<ReferenceDescription>>,
    ) {
        self.pages
            .insert((node, direction, UaNodeId::numeric(0, reference_type)), pages);
    }

    pub fn add_child_pages(&mut self, node: UaNodeId, pages: Vec<Vec<ReferenceDescription>>) {
        self.add_pages(node, BrowseDirection::Forward, ids::HIERARCHICAL_REFERENCES, pages);
    }

    pub fn add_super_types(&mut self, node: UaNodeId, super_types: &[UaNodeId]) {
        let references = super_types
            .iter()
            .map(|id| ReferenceDescription {
                node_id: id.clone(),
                node_class: 8,
                ..Default::default()
            })
            .collect();
        self.add_pages(node, BrowseDirection::Backward, ids::HAS_SUBTYPE, vec![references]);
    }

    pub fn fail_browse(&mut self, node: UaNodeId, status: StatusCode) {
        self.browse_failures.insert(node, status);
    }

    pub fn set_attribute(&mut self, node: UaNodeId, attribute: AttributeId, value: Variant) {
        self.attributes.insert((node, attribute), value);
    }

    pub fn set_translation(&mut self, start: UaNodeId, name: UaQualifiedName, result: BrowsePathResult) {
        self.translations.insert((start, name), result);
    }

    pub fn browse_calls(&self) -> u32 {
        self.browse_calls.load(Ordering::SeqCst)
    }

    pub fn browse_next_calls(&self) -> u32 {
        self.browse_next_calls.load(Ordering::SeqCst)
    }

    fn page(&self, key: &BrowseKey, index: usize) -> BrowseResponse {
        let Some(pages) = self.pages.get(key) else {
            return BrowseResponse::default();
        };
        let continuation_point = (index + 1 < pages.len()).then(|| {
            format!("{}#{}#{}#{}", key.0, key.1.value(), key.2, index + 1).into_bytes()
        });
        BrowseResponse {
            status: StatusCode::GOOD,
            references: pages.get(index).cloned().unwrap_or_default(),
            continuation_point,
        }
    }
}

#[async_trait]
impl UaTransport for MockTransport {
    async fn get_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        Ok(vec![EndpointDescription::new(url, Default::default())])
    }

    async fn connect(&mut self, _: &EndpointDescription, _: &SessionOptions) -> OpcUaResult<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn browse(&self, request: &BrowseDescription) -> OpcUaResult<BrowseResponse> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.browse_failures.get(&request.node_id) {
            return Ok(BrowseResponse {
                status: *status,
                ..Default::default()
            });
        }
        let key = (
            request.node_id.clone(),
            request.direction,
            request.reference_type.clone(),
        );
        Ok(self.page(&key, 0))
    }

    async fn browse_next(&self, continuation_point: &[u8]) -> OpcUaResult<BrowseResponse> {
        self.browse_next_calls.fetch_add(1, Ordering::SeqCst);
        let text = String::from_utf8_lossy(continuation_point);
        let parts: Vec<&str> = text.split('#').collect();
        let direction = match parts[1] {
            "0" => BrowseDirection::Forward,
            "1" => BrowseDirection::Backward,
            _ => BrowseDirection::Both,
        };
        let key: BrowseKey = (parts[0].parse()?, direction, parts[2].parse()?);
        let index: usize = parts[3].parse().unwrap_or(usize::MAX);
        Ok(self.page(&key, index))
    }

    async fn read(&self, nodes: &[ReadValueId]) -> OpcUaResult<ReadResponse> {
        let values = nodes
            .iter()
            .map(|request| {
                if request.node_id == UaNodeId::numeric(0, ids::SERVER_NAMESPACE_ARRAY) {
                    let uris = self.namespaces.iter().cloned().map(Variant::String).collect();
                    return DataValue::good(Variant::Array(uris));
                }
                match self.attributes.get(&(request.node_id.clone(), request.attribute)) {
                    Some(value) => DataValue::good(value.clone()),
                    None => DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN),
                }
            })
            .collect();
        Ok(ReadResponse {
            status: StatusCode::GOOD,
            values,
        })
    }

    async fn translate_browse_path(&self, path: &BrowsePath) -> OpcUaResult<TranslateResponse> {
        let result = path
            .elements
            .first()
            .and_then(|element| {
                self.translations
                    .get(&(path.start.clone(), element.target_name.clone()))
            })
            .cloned()
            .unwrap_or(BrowsePathResult {
                status: StatusCode::BAD_NO_MATCH,
                targets: Vec::new(),
            });
        Ok(TranslateResponse {
            status: StatusCode::GOOD,
            results: vec![result],
        })
    }

    async fn subscribe(&self, _: &UaNodeId, _: ValueCallback) -> OpcUaResult<u32> {
        Ok(1)
    }

    async fn unsubscribe(&self, _: u32) -> OpcUaResult<()> {
        Ok(())
    }
}
