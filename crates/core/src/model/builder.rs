use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MatcherError;
use crate::loader::{ClassRecord, RefKind};
use crate::model::{
    descriptor, ClassGraph, ClassId, ClassInstance, ClassOrigin, FieldId, FieldInstance, MethodId,
    MethodInstance, Side,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Malformed,
    Duplicate,
    UnresolvedHierarchy,
}

/// A non-fatal problem found while building one side's graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIssue {
    pub side: Side,
    pub kind: IssueKind,
    pub class: String,
    pub message: String,
}

impl BuildIssue {
    pub(crate) fn new(side: Side, kind: IssueKind, class: impl Into<String>, err: &MatcherError) -> Self {
        Self { side, kind, class: class.into(), message: err.to_string() }
    }
}

/// Builds a closed [`ClassGraph`] for one side.
///
/// Records are registered with [`GraphBuilder::add_classes`]; members, the
/// hierarchy and body references are wired up by [`GraphBuilder::finish`],
/// once every definition is known.
pub struct GraphBuilder {
    graph: ClassGraph,
    platform_prefixes: Vec<String>,
    pending: Vec<(ClassId, ClassRecord)>,
    issues: Vec<BuildIssue>,
}

impl GraphBuilder {
    pub fn new(side: Side, platform_prefixes: &[String]) -> Self {
        Self {
            graph: ClassGraph::new(side),
            platform_prefixes: platform_prefixes.to_vec(),
            pending: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn side(&self) -> Side {
        self.graph.side
    }

    fn is_platform(&self, name: &str) -> bool {
        self.platform_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Register class definitions. Malformed records and names already defined
    /// on this side are rejected with an issue; the rest are kept.
    pub fn add_classes(&mut self, records: Vec<ClassRecord>, origin: ClassOrigin) {
        for record in records {
            if let Err(err) = record.validate() {
                warn!(side = %self.side(), "rejecting {}: {err}", record.binary_name);
                self.issues.push(BuildIssue::new(
                    self.side(),
                    IssueKind::Malformed,
                    record.binary_name.clone(),
                    &err,
                ));
                continue;
            }

            let type_id = descriptor::type_id_for_internal(&record.binary_name);
            if self.graph.by_id.contains_key(&type_id) {
                let err = MatcherError::malformed(&record.binary_name, "duplicate class definition");
                warn!(side = %self.side(), "{err}");
                self.issues.push(BuildIssue::new(
                    self.side(),
                    IssueKind::Duplicate,
                    record.binary_name.clone(),
                    &err,
                ));
                continue;
            }

            let id = self.push_class(ClassInstance {
                id: type_id,
                name: record.binary_name.clone(),
                side: self.side(),
                origin,
                access: record.access,
                super_class: None,
                interfaces: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                children: Vec::new(),
                implementers: Vec::new(),
                method_type_refs: Vec::new(),
                field_type_refs: Vec::new(),
                strings: Vec::new(),
                array: None,
                hierarchy_resolved: true,
            });
            self.pending.push((id, record));
        }
    }

    fn push_class(&mut self, instance: ClassInstance) -> ClassId {
        let id = ClassId(self.graph.classes.len() as u32);
        self.graph.by_id.insert(instance.id.clone(), id);
        self.graph.classes.push(instance);
        id
    }

    /// Class for `type_id`, creating a placeholder when nothing defines it.
    fn get_or_create(&mut self, type_id: &str) -> ClassId {
        if let Some(id) = self.graph.lookup(type_id) {
            return id;
        }
        let array = descriptor::array_element(type_id)
            .map(|(dims, element)| (dims, element.to_string()))
            .map(|(dims, element)| (dims, self.get_or_create(&element)));
        let name = descriptor::display_name(type_id).to_string();
        let known = array.is_some() || descriptor::is_primitive(type_id) || self.is_platform(&name);
        self.push_class(ClassInstance {
            id: type_id.to_string(),
            name,
            side: self.side(),
            origin: ClassOrigin::Placeholder,
            access: 0,
            super_class: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            children: Vec::new(),
            implementers: Vec::new(),
            method_type_refs: Vec::new(),
            field_type_refs: Vec::new(),
            strings: Vec::new(),
            array,
            hierarchy_resolved: known,
        })
    }

    fn get_or_create_name(&mut self, internal_name: &str) -> ClassId {
        self.get_or_create(&descriptor::type_id_for_internal(internal_name))
    }

    /// Wire up members, hierarchy and references, and return the graph.
    pub fn finish(mut self) -> (ClassGraph, Vec<BuildIssue>) {
        let pending = std::mem::take(&mut self.pending);

        let mut member_ids: Vec<Vec<(MethodId, usize)>> = Vec::with_capacity(pending.len());
        for (cid, record) in &pending {
            member_ids.push(self.add_members(*cid, record));
        }
        for (cid, record) in &pending {
            self.link_hierarchy(*cid, record);
        }
        self.resolve_hierarchy(&pending);
        for ((cid, record), methods) in pending.iter().zip(&member_ids) {
            self.link_bodies(*cid, record, methods);
        }
        self.normalize();

        debug!(
            side = %self.side(),
            classes = self.graph.class_count(),
            methods = self.graph.method_count(),
            fields = self.graph.field_count(),
            "graph built"
        );
        (self.graph, self.issues)
    }

    /// Create member nodes; returns each method with its index in `record.methods`.
    fn add_members(&mut self, cid: ClassId, record: &ClassRecord) -> Vec<(MethodId, usize)> {
        let mut seen = HashSet::new();
        let mut created = Vec::with_capacity(record.methods.len());
        for (index, method) in record.methods.iter().enumerate() {
            if !seen.insert((method.name.as_str(), method.descriptor.as_str())) {
                self.duplicate_member(record, &method.name, &method.descriptor);
                continue;
            }
            // validated in add_classes
            let Ok((args, ret)) = descriptor::parse_method(&method.descriptor) else {
                continue;
            };
            let args: Vec<ClassId> = args.iter().map(|a| self.get_or_create(a)).collect();
            let ret = self.get_or_create(&ret);
            let mid = MethodId(self.graph.methods.len() as u32);
            let position = self.graph.classes[cid.index()].methods.len();
            for ty in args.iter().chain(std::iter::once(&ret)) {
                self.graph.classes[ty.index()].method_type_refs.push(mid);
            }
            self.graph.methods.push(MethodInstance {
                owner: cid,
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
                access: method.access,
                position,
                args,
                ret,
                refs_out: Vec::new(),
                refs_in: Vec::new(),
                field_reads: Vec::new(),
                field_writes: Vec::new(),
                class_refs: Vec::new(),
                strings: method.strings.clone(),
                external_refs: Vec::new(),
                code_size: method.code_size,
            });
            self.graph.classes[cid.index()].methods.push(mid);
            created.push((mid, index));
        }

        seen.clear();
        for field in &record.fields {
            if !seen.insert((field.name.as_str(), field.descriptor.as_str())) {
                self.duplicate_member(record, &field.name, &field.descriptor);
                continue;
            }
            let ty = self.get_or_create(&field.descriptor);
            let fid = FieldId(self.graph.fields.len() as u32);
            let position = self.graph.classes[cid.index()].fields.len();
            self.graph.classes[ty.index()].field_type_refs.push(fid);
            self.graph.fields.push(FieldInstance {
                owner: cid,
                name: field.name.clone(),
                descriptor: field.descriptor.clone(),
                access: field.access,
                position,
                ty,
                readers: Vec::new(),
                writers: Vec::new(),
            });
            self.graph.classes[cid.index()].fields.push(fid);
        }
        created
    }

    fn duplicate_member(&mut self, record: &ClassRecord, name: &str, desc: &str) {
        let err = MatcherError::malformed(
            &record.binary_name,
            format!("duplicate member {name} {desc}"),
        );
        warn!(side = %self.side(), "{err}");
        self.issues.push(BuildIssue::new(
            self.side(),
            IssueKind::Duplicate,
            record.binary_name.clone(),
            &err,
        ));
    }

    fn link_hierarchy(&mut self, cid: ClassId, record: &ClassRecord) {
        if let Some(super_name) = &record.super_name {
            let sup = self.get_or_create_name(super_name);
            if sup != cid {
                self.graph.classes[cid.index()].super_class = Some(sup);
                self.graph.classes[sup.index()].children.push(cid);
            }
        }
        for iface in &record.interface_names {
            let iid = self.get_or_create_name(iface);
            if iid != cid {
                self.graph.classes[cid.index()].interfaces.push(iid);
                self.graph.classes[iid.index()].implementers.push(cid);
            }
        }
    }

    /// Flag defined classes whose super type chain reaches an unknown placeholder.
    fn resolve_hierarchy(&mut self, pending: &[(ClassId, ClassRecord)]) {
        let mut memo: HashMap<ClassId, Option<ClassId>> = HashMap::new();
        for (cid, record) in pending {
            let missing = self.first_missing(*cid, &mut memo, &mut HashSet::new());
            if let Some(missing) = missing {
                self.graph.classes[cid.index()].hierarchy_resolved = false;
                let err = MatcherError::UnresolvedHierarchy {
                    class: record.binary_name.clone(),
                    missing: self.graph.class(missing).name.clone(),
                };
                debug!(side = %self.side(), "{err}");
                self.issues.push(BuildIssue::new(
                    self.side(),
                    IssueKind::UnresolvedHierarchy,
                    record.binary_name.clone(),
                    &err,
                ));
            }
        }
    }

    fn first_missing(
        &self,
        cid: ClassId,
        memo: &mut HashMap<ClassId, Option<ClassId>>,
        visiting: &mut HashSet<ClassId>,
    ) -> Option<ClassId> {
        if let Some(known) = memo.get(&cid) {
            return *known;
        }
        let node = self.graph.class(cid);
        if node.origin == ClassOrigin::Placeholder {
            return (!node.hierarchy_resolved).then_some(cid);
        }
        if !visiting.insert(cid) {
            // cyclic hierarchy never bottoms out
            return Some(cid);
        }
        let supers: Vec<ClassId> =
            node.super_class.into_iter().chain(node.interfaces.iter().copied()).collect();
        let result = supers.into_iter().find_map(|s| self.first_missing(s, memo, visiting));
        visiting.remove(&cid);
        memo.insert(cid, result);
        result
    }

    fn link_bodies(&mut self, cid: ClassId, record: &ClassRecord, methods: &[(MethodId, usize)]) {
        for &(mid, index) in methods {
            for r in &record.methods[index].refs {
                let owner = self.get_or_create_name(&r.owner);
                self.graph.methods[mid.index()].class_refs.push(owner);
                match r.kind {
                    RefKind::TypeRef => {}
                    RefKind::Call => match self.graph.resolve_method(owner, &r.name, &r.descriptor) {
                        Some(target) => {
                            self.graph.methods[mid.index()].refs_out.push(target);
                            self.graph.methods[target.index()].refs_in.push(mid);
                        }
                        None => self.external(mid, &r.owner, &r.name, &r.descriptor),
                    },
                    RefKind::FieldRead | RefKind::FieldWrite => {
                        match self.graph.resolve_field(owner, &r.name, &r.descriptor) {
                            Some(target) if r.kind == RefKind::FieldRead => {
                                self.graph.methods[mid.index()].field_reads.push(target);
                                self.graph.fields[target.index()].readers.push(mid);
                            }
                            Some(target) => {
                                self.graph.methods[mid.index()].field_writes.push(target);
                                self.graph.fields[target.index()].writers.push(mid);
                            }
                            None => self.external(mid, &r.owner, &r.name, &r.descriptor),
                        }
                    }
                }
            }
            let strings = self.graph.methods[mid.index()].strings.clone();
            self.graph.classes[cid.index()].strings.extend(strings);
        }
    }

    fn external(&mut self, mid: MethodId, owner: &str, name: &str, desc: &str) {
        self.graph.methods[mid.index()].external_refs.push(format!("{owner}.{name} {desc}"));
    }

    fn normalize(&mut self) {
        fn sort_dedup<T: Ord>(v: &mut Vec<T>) {
            v.sort();
            v.dedup();
        }
        for class in &mut self.graph.classes {
            sort_dedup(&mut class.children);
            sort_dedup(&mut class.implementers);
            sort_dedup(&mut class.method_type_refs);
            sort_dedup(&mut class.field_type_refs);
            sort_dedup(&mut class.strings);
        }
        for method in &mut self.graph.methods {
            sort_dedup(&mut method.refs_out);
            sort_dedup(&mut method.refs_in);
            sort_dedup(&mut method.field_reads);
            sort_dedup(&mut method.field_writes);
            sort_dedup(&mut method.class_refs);
            sort_dedup(&mut method.strings);
            sort_dedup(&mut method.external_refs);
        }
        for field in &mut self.graph.fields {
            sort_dedup(&mut field.readers);
            sort_dedup(&mut field.writers);
        }
    }
}
