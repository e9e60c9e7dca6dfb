//! rxrepo - query derivation and parameter binding for repository methods

pub mod backend;
pub mod bind;
pub mod binding;
pub mod cache;
pub mod config;
pub mod derive;
pub mod error;
pub mod execution;
pub mod method;
pub mod model;
pub mod paging;
pub mod repository;
pub mod template;
pub mod value;

pub use backend::{BoundQuery, MemoryBackend, QueryBackend, Row};
pub use bind::{Argument, ArgumentAccessor, BindContext, ErrorPolicy, MethodArguments, ParameterBinder};
pub use binding::{BindingIdentifier, BindingKind, EscapeCharacter, LikeKind, ParameterBinding, ParameterOrigin};
pub use config::EngineConfig;
pub use derive::{parse_method_name, CriteriaQuery, PartTree, PredicateCompiler};
pub use error::{BindError, CompileError, QueryError, QueryResult, ResolutionError};
pub use execution::{ExecutionStrategy, QueryOutput, QueryShape};
pub use method::{MethodKey, MethodParameter, MethodSignature, ReturnKind};
pub use model::{EntityDef, EntityModel, EntitySchema, PropertyPath};
pub use paging::{Direction, Limit, Order, Pageable, Sort};
pub use repository::{DeclaredOptions, QueryMethod, Repository};
pub use template::DeclaredQuery;
pub use value::{Value, ValueType};
