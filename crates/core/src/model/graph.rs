use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::{
    descriptor, ClassId, ClassInstance, ClassOrigin, EntityKey, EntityKind, EntityRef, FieldId,
    FieldInstance, MethodId, MethodInstance, Side,
};

/// Closed entity graph for one side.
#[derive(Debug, Clone)]
pub struct ClassGraph {
    pub(crate) side: Side,
    pub(crate) classes: Vec<ClassInstance>,
    pub(crate) methods: Vec<MethodInstance>,
    pub(crate) fields: Vec<FieldInstance>,
    pub(crate) by_id: HashMap<String, ClassId>,
}

impl ClassGraph {
    pub(crate) fn new(side: Side) -> Self {
        Self {
            side,
            classes: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn class(&self, id: ClassId) -> &ClassInstance {
        &self.classes[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &MethodInstance {
        &self.methods[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldInstance {
        &self.fields[id.index()]
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len() as u32).map(ClassId)
    }

    pub fn count_origin(&self, origin: ClassOrigin) -> usize {
        self.classes.iter().filter(|c| c.origin == origin).count()
    }

    /// Look up a class by type id (`La/b/C;`, `I`, `[I`).
    pub fn lookup(&self, type_id: &str) -> Option<ClassId> {
        self.by_id.get(type_id).copied()
    }

    /// Look up a class by internal name (`a/b/C`).
    pub fn lookup_name(&self, name: &str) -> Option<ClassId> {
        self.lookup(&descriptor::type_id_for_internal(name))
    }

    /// Method declared directly by `owner`.
    pub fn declared_method(&self, owner: ClassId, name: &str, desc: &str) -> Option<MethodId> {
        self.class(owner).methods.iter().copied().find(|m| {
            let method = self.method(*m);
            method.name == name && method.descriptor == desc
        })
    }

    /// Field declared directly by `owner`.
    pub fn declared_field(&self, owner: ClassId, name: &str, desc: &str) -> Option<FieldId> {
        self.class(owner).fields.iter().copied().find(|f| {
            let field = self.field(*f);
            field.name == name && field.descriptor == desc
        })
    }

    /// Breadth-first walk over `start` and its super types, superclass first.
    fn hierarchy_walk<T>(&self, start: ClassId, mut visit: impl FnMut(ClassId) -> Option<T>) -> Option<T> {
        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::new();
        while let Some(cls) = queue.pop_front() {
            if !seen.insert(cls) {
                continue;
            }
            if let Some(found) = visit(cls) {
                return Some(found);
            }
            let node = self.class(cls);
            queue.extend(node.super_class);
            queue.extend(node.interfaces.iter().copied());
        }
        None
    }

    /// Resolve a method reference the way the JVM would: owner first, then super types.
    pub fn resolve_method(&self, owner: ClassId, name: &str, desc: &str) -> Option<MethodId> {
        self.hierarchy_walk(owner, |cls| self.declared_method(cls, name, desc))
    }

    pub fn resolve_field(&self, owner: ClassId, name: &str, desc: &str) -> Option<FieldId> {
        self.hierarchy_walk(owner, |cls| self.declared_field(cls, name, desc))
    }

    /// Number of superclass links above `id`, stopping at a class without a superclass.
    pub fn hierarchy_depth(&self, id: ClassId) -> usize {
        let mut depth = 0;
        let mut current = self.class(id).super_class;
        while let Some(cls) = current {
            depth += 1;
            if depth > self.classes.len() {
                break;
            }
            current = self.class(cls).super_class;
        }
        depth
    }

    /// Stable name-based key for an entity.
    pub fn key(&self, entity: EntityRef) -> EntityKey {
        match entity {
            EntityRef::Class(id) => EntityKey::class(self.class(id).name.clone()),
            EntityRef::Method(id) => {
                let m = self.method(id);
                EntityKey::method(self.class(m.owner).name.clone(), m.name.clone(), m.descriptor.clone())
            }
            EntityRef::Field(id) => {
                let f = self.field(id);
                EntityKey::field(self.class(f.owner).name.clone(), f.name.clone(), f.descriptor.clone())
            }
        }
    }

    /// Inverse of [`ClassGraph::key`].
    pub fn resolve_key(&self, key: &EntityKey) -> Option<EntityRef> {
        match key.kind {
            EntityKind::Class => self.lookup_name(&key.name).map(EntityRef::Class),
            EntityKind::Method => {
                let owner = self.lookup_name(key.owner.as_deref()?)?;
                self.declared_method(owner, &key.name, key.descriptor.as_deref()?).map(EntityRef::Method)
            }
            EntityKind::Field => {
                let owner = self.lookup_name(key.owner.as_deref()?)?;
                self.declared_field(owner, &key.name, key.descriptor.as_deref()?).map(EntityRef::Field)
            }
        }
    }

    /// Human-readable method signature, e.g. `foo(I, a/B)V`.
    pub fn method_display(&self, id: MethodId) -> String {
        let m = self.method(id);
        let args: Vec<&str> = m.args.iter().map(|a| self.class(*a).name.as_str()).collect();
        format!("{}({}){}", m.name, args.join(", "), self.class(m.ret).name)
    }

    /// Owner class of a member, or the class itself.
    pub fn owner_of(&self, entity: EntityRef) -> ClassId {
        match entity {
            EntityRef::Class(id) => id,
            EntityRef::Method(id) => self.method(id).owner,
            EntityRef::Field(id) => self.field(id).owner,
        }
    }
}
