//! Process-wide class registry.
//!
//! Classes are keyed by `(name, loader)`. Loader 0 is the bootstrap loader;
//! every other loader delegates to it first and only then consults its own
//! source. A class found through delegation is also recorded under the
//! initiating loader so later lookups hit directly.

use crate::class::{ArrayInfo, Class, ClassParts};
use crate::linker::link;
use crate::loader::ClassSource;
use bytecode_system::access::{ACC_ABSTRACT, ACC_FINAL, ACC_PUBLIC};
use bytecode_system::{ClassFile, ConstantPool, FieldType, MethodDescriptor};
use core_types::{ClassId, ErrorKind, LoaderId, VmError};
use log::Level;
use memory_manager::ArrayKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) const OBJECT: &str = "java/lang/Object";
pub(crate) const CLONEABLE: &str = "java/lang/Cloneable";
pub(crate) const SERIALIZABLE: &str = "java/io/Serializable";

#[derive(Default)]
struct Tables {
    map: HashMap<(String, LoaderId), Arc<Class>>,
    by_id: Vec<Arc<Class>>,
}

/// The class table plus the sources of every registered loader.
pub struct Registry {
    tables: RwLock<Tables>,
    sources: RwLock<Vec<Arc<dyn ClassSource>>>,
    verbose: bool,
}

impl Registry {
    /// Creates a registry whose bootstrap loader reads from `bootstrap`.
    pub fn new(bootstrap: Arc<dyn ClassSource>, verbose: bool) -> Self {
        Registry {
            tables: RwLock::new(Tables::default()),
            sources: RwLock::new(vec![bootstrap]),
            verbose,
        }
    }

    /// Registers another loader.
    pub fn add_loader(&self, source: Arc<dyn ClassSource>) -> LoaderId {
        let mut sources = self.sources.write();
        sources.push(source);
        LoaderId((sources.len() - 1) as u32)
    }

    /// Number of registered loaders, bootstrap included.
    pub fn loader_count(&self) -> usize {
        self.sources.read().len()
    }

    /// Class already known to `loader` under `name`.
    pub fn find_loaded(&self, name: &str, loader: LoaderId) -> Option<Arc<Class>> {
        self.tables
            .read()
            .map
            .get(&(name.to_string(), loader))
            .cloned()
    }

    /// Class by handle.
    pub fn get(&self, id: ClassId) -> Option<Arc<Class>> {
        self.tables.read().by_id.get(id.index()).cloned()
    }

    /// Every defined class, in definition order.
    pub fn classes(&self) -> Vec<Arc<Class>> {
        self.tables.read().by_id.clone()
    }

    /// Number of defined classes.
    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    /// Returns true before any class is defined.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads `name` as seen by `loader`, defining it and its supertypes if
    /// needed.
    pub fn load(&self, name: &str, loader: LoaderId) -> Result<Arc<Class>, VmError> {
        self.load_chain(name, loader, &mut Vec::new())
    }

    fn load_chain(
        &self,
        name: &str,
        loader: LoaderId,
        chain: &mut Vec<String>,
    ) -> Result<Arc<Class>, VmError> {
        if let Some(class) = self.find_loaded(name, loader) {
            return Ok(class);
        }
        if name.starts_with('[') {
            return self.define_array(name, loader, chain);
        }
        if chain.iter().any(|pending| pending == name) {
            return Err(VmError::with_message(ErrorKind::ClassCircularityError, name));
        }

        let (file, defining) = self
            .find_source(name, loader)
            .ok_or_else(|| VmError::with_message(ErrorKind::NoClassDefFoundError, name))?;
        if defining != loader {
            let class = self.load_chain(name, defining, chain)?;
            self.record_initiating(name, loader, &class);
            return Ok(class);
        }
        if file.name != name {
            return Err(VmError::with_message(
                ErrorKind::NoClassDefFoundError,
                format!("{} (wrong name: {})", name, file.name),
            ));
        }

        chain.push(name.to_string());
        let parts = self.prepare(file, defining, chain);
        chain.pop();
        let parts = parts?;
        Ok(self.install(name, defining, |id| ClassParts { id, ..parts }))
    }

    fn find_source(&self, name: &str, loader: LoaderId) -> Option<(ClassFile, LoaderId)> {
        let sources = self.sources.read();
        if let Some(file) = sources.first()?.find_class(name) {
            return Some((file, LoaderId::BOOTSTRAP));
        }
        if loader.is_bootstrap() {
            return None;
        }
        sources
            .get(loader.index())?
            .find_class(name)
            .map(|file| (file, loader))
    }

    fn prepare(
        &self,
        file: ClassFile,
        loader: LoaderId,
        chain: &mut Vec<String>,
    ) -> Result<ClassParts, VmError> {
        let format_error = |what: String| VmError::with_message(ErrorKind::ClassFormatError, what);

        for field in &file.fields {
            FieldType::parse(&field.descriptor).map_err(|e| format_error(e.to_string()))?;
        }
        let methods = file
            .methods
            .into_iter()
            .map(|info| {
                let signature = MethodDescriptor::parse(&info.descriptor)
                    .map_err(|e| format_error(e.to_string()))?;
                Ok((info, signature))
            })
            .collect::<Result<Vec<_>, VmError>>()?;

        let super_class = match file.super_name.as_deref() {
            None if file.name == OBJECT => None,
            None => return Err(format_error(format!("{} has no superclass", file.name))),
            Some(super_name) => {
                let super_class = self.load_chain(super_name, loader, chain)?;
                if super_class.is_interface() || super_class.is_array() {
                    return Err(VmError::with_message(
                        ErrorKind::IncompatibleClassChangeError,
                        format!("class {} has interface {} as super class", file.name, super_name),
                    ));
                }
                Some(super_class)
            }
        };

        let mut interfaces = Vec::with_capacity(file.interfaces.len());
        for interface_name in &file.interfaces {
            let interface = self.load_chain(interface_name, loader, chain)?;
            if !interface.is_interface() {
                return Err(VmError::with_message(
                    ErrorKind::IncompatibleClassChangeError,
                    format!("class {} can not implement {}, because it is not an interface", file.name, interface_name),
                ));
            }
            interfaces.push(interface);
        }

        Ok(ClassParts {
            id: ClassId(0),
            name: file.name,
            loader,
            access_flags: file.access_flags,
            super_class,
            interfaces,
            array: None,
            fields: file.fields,
            methods,
            pool: file.constant_pool,
            source_file: file.source_file,
        })
    }

    fn define_array(
        &self,
        name: &str,
        loader: LoaderId,
        chain: &mut Vec<String>,
    ) -> Result<Arc<Class>, VmError> {
        let malformed = || VmError::with_message(ErrorKind::ClassFormatError, name);
        let component_descriptor = &name[1..];
        let component = match component_descriptor.as_bytes().first() {
            Some(b'L') => {
                let element = component_descriptor
                    .strip_prefix('L')
                    .and_then(|rest| rest.strip_suffix(';'))
                    .filter(|element| !element.is_empty())
                    .ok_or_else(malformed)?;
                Some(self.load_chain(element, loader, chain)?)
            }
            Some(b'[') => Some(self.load_chain(component_descriptor, loader, chain)?),
            _ => {
                let primitive = FieldType::parse(component_descriptor).map_err(|_| malformed())?;
                if primitive.is_reference() {
                    return Err(malformed());
                }
                None
            }
        };

        let defining = component
            .as_ref()
            .map_or(LoaderId::BOOTSTRAP, |class| class.loader());
        if defining != loader {
            if let Some(class) = self.find_loaded(name, defining) {
                self.record_initiating(name, loader, &class);
                return Ok(class);
            }
        }

        let object = self.load_chain(OBJECT, LoaderId::BOOTSTRAP, chain)?;
        let interfaces = vec![
            self.load_chain(CLONEABLE, LoaderId::BOOTSTRAP, chain)?,
            self.load_chain(SERIALIZABLE, LoaderId::BOOTSTRAP, chain)?,
        ];
        let kind = ArrayKind::from_component(component_descriptor);
        let dimensions = component
            .as_ref()
            .and_then(|class| class.array_info())
            .map_or(1, |info| info.dimensions + 1);

        let class = self.install(name, defining, |id| ClassParts {
            id,
            name: name.to_string(),
            loader: defining,
            access_flags: ACC_PUBLIC | ACC_FINAL | ACC_ABSTRACT,
            super_class: Some(object),
            interfaces,
            array: Some(ArrayInfo {
                kind,
                component,
                dimensions,
            }),
            fields: Vec::new(),
            methods: Vec::new(),
            pool: ConstantPool::new(),
            source_file: None,
        });
        if defining != loader {
            self.record_initiating(name, loader, &class);
        }
        link(&class)?;
        Ok(class)
    }

    fn install(
        &self,
        name: &str,
        loader: LoaderId,
        build: impl FnOnce(ClassId) -> ClassParts,
    ) -> Arc<Class> {
        let mut tables = self.tables.write();
        let key = (name.to_string(), loader);
        if let Some(existing) = tables.map.get(&key) {
            return Arc::clone(existing);
        }
        let id = ClassId(tables.by_id.len() as u32);
        let class = Class::new(build(id));
        tables.map.insert(key, Arc::clone(&class));
        tables.by_id.push(Arc::clone(&class));
        drop(tables);

        let level = if self.verbose { Level::Info } else { Level::Debug };
        log::log!(level, "[Loaded {} by loader {} as class {}]", name, loader, id);
        class
    }

    fn record_initiating(&self, name: &str, loader: LoaderId, class: &Arc<Class>) {
        self.tables
            .write()
            .map
            .entry((name.to_string(), loader))
            .or_insert_with(|| Arc::clone(class));
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.len())
            .field("loaders", &self.loader_count())
            .finish()
    }
}
