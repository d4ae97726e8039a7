//! Side-table of injection and interception metadata
//!
//! Injection points and interceptors are attached to types by explicit
//! registration calls ([`define_constructor`](crate::define_constructor),
//! [`define_property`](crate::define_property),
//! [`intercept_class`](crate::intercept_class),
//! [`intercept_method`](crate::intercept_method)) and looked up here by
//! `(kind, type, member)`.

use crate::inject::Injection;
use crate::interceptor::InterceptorOrKey;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;

/// Kind of metadata attached to a type or member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
	ConstructorParameters,
	Properties,
	MethodInterceptors,
	ClassInterceptors,
}

/// A metadata entry; each kind stores its own variant
#[derive(Clone)]
pub enum MetadataEntry {
	/// Constructor injections, by position
	Parameters(Vec<Injection>),
	/// Property injections in declaration order
	Properties(Vec<(String, Injection)>),
	/// Interceptors of a class or method, outermost first
	Interceptors(Vec<InterceptorOrKey>),
}

type MetadataKey = (MetadataKind, TypeId, Option<String>);

static METADATA: Lazy<RwLock<HashMap<MetadataKey, MetadataEntry>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Access to the metadata side-table
pub struct MetadataInspector;

impl MetadataInspector {
	/// Stores `entry`, replacing any previous entry
	pub fn define(kind: MetadataKind, target: TypeId, member: Option<&str>, entry: MetadataEntry) {
		METADATA
			.write()
			.insert((kind, target, member.map(str::to_string)), entry);
	}

	/// Replaces the entry with the result of `update`
	pub fn update<F>(kind: MetadataKind, target: TypeId, member: Option<&str>, update: F)
	where
		F: FnOnce(Option<&MetadataEntry>) -> MetadataEntry,
	{
		let mut metadata = METADATA.write();
		let key = (kind, target, member.map(str::to_string));
		let entry = update(metadata.get(&key));
		metadata.insert(key, entry);
	}

	pub fn get(kind: MetadataKind, target: TypeId, member: Option<&str>) -> Option<MetadataEntry> {
		METADATA
			.read()
			.get(&(kind, target, member.map(str::to_string)))
			.cloned()
	}

	/// Constructor injections of `target`
	pub fn constructor_parameters(target: TypeId) -> Vec<Injection> {
		match Self::get(MetadataKind::ConstructorParameters, target, None) {
			Some(MetadataEntry::Parameters(parameters)) => parameters,
			_ => Vec::new(),
		}
	}

	/// Property injections of `target`
	pub fn properties(target: TypeId) -> Vec<(String, Injection)> {
		match Self::get(MetadataKind::Properties, target, None) {
			Some(MetadataEntry::Properties(properties)) => properties,
			_ => Vec::new(),
		}
	}

	/// Interceptors declared for `method` of `target`
	pub fn method_interceptors(target: TypeId, method: &str) -> Vec<InterceptorOrKey> {
		match Self::get(MetadataKind::MethodInterceptors, target, Some(method)) {
			Some(MetadataEntry::Interceptors(interceptors)) => interceptors,
			_ => Vec::new(),
		}
	}

	/// Interceptors declared for every method of `target`
	pub fn class_interceptors(target: TypeId) -> Vec<InterceptorOrKey> {
		match Self::get(MetadataKind::ClassInterceptors, target, None) {
			Some(MetadataEntry::Interceptors(interceptors)) => interceptors,
			_ => Vec::new(),
		}
	}
}
