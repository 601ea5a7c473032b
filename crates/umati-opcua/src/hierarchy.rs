// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Memoized subtype queries.

use std::collections::HashMap;

use umati_model::NodeId;

use crate::browse::{AddressSpaceBrowser, BrowseContext, ResultMask};
use crate::client::UaTransport;
use crate::error::OpcUaResult;
use crate::types::{ids, BrowseDirection};

/// Direct supertype of each type looked up so far (`None` for a root type).
pub type SuperTypeCache = HashMap<NodeId, Option<NodeId>>;

/// Answers "is `candidate` the same type as, or a subtype of, `expected`".
///
/// Supertypes are browsed once and cached. The cache is only valid for the
/// session it was filled in; call [`clear`](Self::clear) on reconnect.
#[derive(Debug, Clone)]
pub struct TypeHierarchyResolver {
    super_types: SuperTypeCache,
    max_depth: usize,
}

impl TypeHierarchyResolver {
    /// Creates a resolver that follows at most `max_depth` supertype hops.
    pub fn new(max_depth: usize) -> Self {
        Self {
            super_types: HashMap::new(),
            max_depth,
        }
    }

    /// Returns the configured hop bound.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the number of cached supertype entries.
    pub fn cached(&self) -> usize {
        self.super_types.len()
    }

    /// Forgets every cached supertype.
    pub fn clear(&mut self) {
        self.super_types.clear();
    }

    /// Subtype check bounded by the configured depth.
    pub async fn is_same_or_subtype<T: UaTransport + ?Sized>(
        &mut self,
        browser: &AddressSpaceBrowser<'_, T>,
        expected: &NodeId,
        candidate: &NodeId,
    ) -> OpcUaResult<bool> {
        self.is_same_or_subtype_within(browser, expected, candidate, self.max_depth)
            .await
    }

    /// Subtype check following at most `max_depth` supertype hops.
    ///
    /// A null candidate is never a subtype. When the bound is exhausted
    /// before `expected` is reached the answer is `false`, even if a deeper
    /// ancestor would have matched.
    pub async fn is_same_or_subtype_within<T: UaTransport + ?Sized>(
        &mut self,
        browser: &AddressSpaceBrowser<'_, T>,
        expected: &NodeId,
        candidate: &NodeId,
        max_depth: usize,
    ) -> OpcUaResult<bool> {
        if candidate.is_null() {
            return Ok(false);
        }

        let namespaces = browser.namespaces();
        let expected = namespaces.canonical(expected)?;
        let mut current = namespaces.canonical(candidate)?;
        let mut remaining = max_depth;

        loop {
            if current == expected {
                return Ok(true);
            }
            if remaining == 0 {
                tracing::trace!(expected = %expected, candidate = %candidate, "Type depth bound reached");
                return Ok(false);
            }
            remaining -= 1;

            match self.super_type(browser, &current).await? {
                Some(super_type) => current = super_type,
                None => return Ok(false),
            }
        }
    }

    /// Returns the direct supertype of a type, browsing on a cache miss.
    pub async fn super_type<T: UaTransport + ?Sized>(
        &mut self,
        browser: &AddressSpaceBrowser<'_, T>,
        type_id: &NodeId,
    ) -> OpcUaResult<Option<NodeId>> {
        if let Some(cached) = self.super_types.get(type_id) {
            return Ok(cached.clone());
        }

        let context = BrowseContext::with_reference(ids::standard(ids::HAS_SUBTYPE))
            .with_direction(BrowseDirection::Backward)
            .with_result_mask(ResultMask::NONE);

        let mut results = browser.browse(type_id, &context).await?;
        let super_type = match results.len() {
            0 => None,
            1 => Some(results.remove(0).node_id),
            n => {
                tracing::warn!(type_id = %type_id, count = n, "Found multiple supertypes");
                None
            }
        };

        self.super_types.insert(type_id.clone(), super_type.clone());
        Ok(super_type)
    }
}

// =============================================================================
// Tests
// =============================================================================
