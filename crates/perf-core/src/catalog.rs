//! In-memory animal, car and employee stores exposed as dispatcher handlers.
//!
//! Each entity is a plain `{ id, name }` record; the name field stands for
//! the animal's type, the car's brand and the employee's name.

use crate::command::{Outcome, Request};
use crate::dispatcher::{DispatcherBuilder, RegistrationError};
use crate::invoker::RestCall;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    Animal,
    Car,
    Employee,
}

impl Entity {
    pub const ALL: [Entity; 3] = [Entity::Animal, Entity::Car, Entity::Employee];

    fn singular(&self) -> &'static str {
        match self {
            Entity::Animal => "ANIMAL",
            Entity::Car => "CAR",
            Entity::Employee => "EMPLOYEE",
        }
    }

    fn plural(&self) -> &'static str {
        match self {
            Entity::Animal => "ANIMALS",
            Entity::Car => "CARS",
            Entity::Employee => "EMPLOYEES",
        }
    }

    /// REST collection path and the JSON field carrying the name.
    fn rest(&self) -> (&'static str, &'static str) {
        match self {
            Entity::Animal => ("/api/animals", "type"),
            Entity::Car => ("/api/cars", "brand"),
            Entity::Employee => ("/api/employees", "name"),
        }
    }

    fn seed(&self) -> [&'static str; 2] {
        match self {
            Entity::Animal => ["cat", "dog"],
            Entity::Car => ["Toyota", "Honda"],
            Entity::Employee => ["Alice", "Bob"],
        }
    }

    fn test_prefix(&self) -> &'static str {
        match self {
            Entity::Animal => "TestAnimal",
            Entity::Car => "TestCar",
            Entity::Employee => "TestEmployee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetAll,
    GetById,
    Create,
    Update,
    Delete,
    Search,
    Page,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::GetAll,
        Operation::GetById,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
        Operation::Search,
        Operation::Page,
    ];
}

/// Action type identifier for an (operation, entity) pair, e.g. `GET_CARS_PAGE`.
pub fn action_type(op: Operation, entity: Entity) -> String {
    let (s, p) = (entity.singular(), entity.plural());
    match op {
        Operation::GetAll => format!("GET_ALL_{p}"),
        Operation::GetById => format!("GET_{s}_BY_ID"),
        Operation::Create => format!("CREATE_{s}"),
        Operation::Update => format!("UPDATE_{s}"),
        Operation::Delete => format!("DELETE_{s}"),
        Operation::Search => format!("SEARCH_{p}"),
        Operation::Page => format!("GET_{p}_PAGE"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRequestKind {
    GetAll,
    GetById { id: u64 },
    Create { name: String },
    Update { id: u64, name: String },
    Delete { id: u64 },
    Search { query: String },
    Page { page: usize, size: usize },
}

impl EntityRequestKind {
    fn operation(&self) -> Operation {
        match self {
            EntityRequestKind::GetAll => Operation::GetAll,
            EntityRequestKind::GetById { .. } => Operation::GetById,
            EntityRequestKind::Create { .. } => Operation::Create,
            EntityRequestKind::Update { .. } => Operation::Update,
            EntityRequestKind::Delete { .. } => Operation::Delete,
            EntityRequestKind::Search { .. } => Operation::Search,
            EntityRequestKind::Page { .. } => Operation::Page,
        }
    }
}

/// A request against one of the entity stores.
#[derive(Debug, Clone)]
pub struct EntityRequest {
    entity: Entity,
    kind: EntityRequestKind,
    action_type: String,
}

impl EntityRequest {
    pub fn new(entity: Entity, kind: EntityRequestKind) -> Self {
        let action_type = action_type(kind.operation(), entity);
        Self {
            entity,
            kind,
            action_type,
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn kind(&self) -> &EntityRequestKind {
        &self.kind
    }
}

impl Request for EntityRequest {
    fn action_type(&self) -> &str {
        &self.action_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub name: String,
}

#[derive(Debug)]
pub struct EntityStore {
    records: Mutex<Vec<Record>>,
    next_id: AtomicU64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn seeded(names: &[&str]) -> Self {
        let store = Self::new();
        for name in names {
            store.add(name);
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn all(&self) -> Vec<Record> {
        self.lock().clone()
    }

    pub fn get(&self, id: u64) -> Option<Record> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    pub fn add(&self, name: &str) -> Record {
        let record = Record {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
        };
        self.lock().push(record.clone());
        record
    }

    pub fn update(&self, id: u64, name: &str) -> Option<Record> {
        let mut records = self.lock();
        let record = records.iter_mut().find(|r| r.id == id)?;
        record.name = name.to_string();
        Some(record.clone())
    }

    pub fn delete(&self, id: u64) -> bool {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|r| r.id != id);
        records.len() != before
    }

    /// Case-insensitive substring match; an empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<Record> {
        let needle = query.to_lowercase();
        self.lock()
            .iter()
            .filter(|r| needle.is_empty() || r.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn page(&self, page: usize, size: usize) -> Vec<Record> {
        if size == 0 {
            return Vec::new();
        }
        let records = self.lock();
        let from = page.saturating_mul(size);
        if from >= records.len() {
            return Vec::new();
        }
        let to = records.len().min(from + size);
        records[from..to].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

/// The three stores behind the demonstration handlers.
#[derive(Debug)]
pub struct Catalog {
    animals: EntityStore,
    cars: EntityStore,
    employees: EntityStore,
}

impl Catalog {
    pub fn seeded() -> Self {
        Self {
            animals: EntityStore::seeded(&Entity::Animal.seed()),
            cars: EntityStore::seeded(&Entity::Car.seed()),
            employees: EntityStore::seeded(&Entity::Employee.seed()),
        }
    }

    pub fn store(&self, entity: Entity) -> &EntityStore {
        match entity {
            Entity::Animal => &self.animals,
            Entity::Car => &self.cars,
            Entity::Employee => &self.employees,
        }
    }

    fn execute(&self, request: &EntityRequest) -> anyhow::Result<Outcome> {
        let store = self.store(request.entity);
        let outcome = match &request.kind {
            EntityRequestKind::GetAll => Outcome::with_payload(serde_json::to_value(store.all())?),
            EntityRequestKind::GetById { id } => match store.get(*id) {
                Some(record) => Outcome::with_payload(serde_json::to_value(record)?),
                None => Outcome::failed(format!("{:?} not found with id: {id}", request.entity)),
            },
            EntityRequestKind::Create { name } => {
                if name.trim().is_empty() {
                    return Ok(Outcome::failed("name must not be blank"));
                }
                let record = store.add(name);
                Outcome::with_payload(serde_json::to_value(record)?).message("created")
            }
            EntityRequestKind::Update { id, name } => match store.update(*id, name) {
                Some(record) => Outcome::with_payload(serde_json::to_value(record)?).message("updated"),
                None => Outcome::failed(format!("{:?} not found with id: {id}", request.entity)),
            },
            EntityRequestKind::Delete { id } => {
                if store.delete(*id) {
                    Outcome::ok().message("deleted")
                } else {
                    Outcome::failed(format!("{:?} not found with id: {id}", request.entity))
                }
            }
            EntityRequestKind::Search { query } => {
                Outcome::with_payload(serde_json::to_value(store.search(query))?)
            }
            EntityRequestKind::Page { page, size } => {
                Outcome::with_payload(serde_json::to_value(store.page(*page, *size))?)
            }
        };
        Ok(outcome)
    }

    /// Registers one handler per (operation, entity) pair.
    pub fn register_handlers(
        self: &Arc<Self>,
        builder: &mut DispatcherBuilder<EntityRequest>,
    ) -> Result<(), RegistrationError> {
        for entity in Entity::ALL {
            for op in Operation::ALL {
                let catalog = Arc::clone(self);
                builder.register(action_type(op, entity), move |req: &EntityRequest| {
                    catalog.execute(req)
                })?;
            }
        }
        Ok(())
    }
}

/// Cycles through the representative read/create/lookup/search mix used
/// by path-B load-test workers.
#[derive(Debug, Default)]
pub struct TrafficMix {
    cursor: AtomicUsize,
}

impl TrafficMix {
    const STEPS: [(Entity, Operation); 8] = [
        (Entity::Animal, Operation::GetAll),
        (Entity::Animal, Operation::Create),
        (Entity::Animal, Operation::GetById),
        (Entity::Animal, Operation::Search),
        (Entity::Car, Operation::GetAll),
        (Entity::Car, Operation::Create),
        (Entity::Employee, Operation::GetAll),
        (Entity::Employee, Operation::Create),
    ];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_request(&self, rng: &mut impl Rng) -> EntityRequest {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % Self::STEPS.len();
        let (entity, op) = Self::STEPS[idx];
        let kind = match op {
            Operation::Create => EntityRequestKind::Create {
                name: format!("{}{}", entity.test_prefix(), rng.gen_range(0..1000)),
            },
            Operation::GetById => EntityRequestKind::GetById { id: 1 },
            Operation::Search => EntityRequestKind::Search {
                query: entity.test_prefix().to_string(),
            },
            _ => EntityRequestKind::GetAll,
        };
        EntityRequest::new(entity, kind)
    }

    /// The equivalent REST calls for path A, in the same order. Create bodies
    /// draw the same random name suffix as the path-B requests.
    pub fn rest_calls() -> Vec<RestCall> {
        Self::STEPS
            .iter()
            .map(|&(entity, op)| {
                let (base, field) = entity.rest();
                match op {
                    Operation::Create => RestCall::post_random_name(base, field, entity.test_prefix()),
                    Operation::GetById => RestCall::get(format!("{base}/1")),
                    Operation::Search => {
                        RestCall::get(format!("{base}/search?{field}={}", entity.test_prefix()))
                    }
                    _ => RestCall::get(base),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::invoker::RestBody;
    use crate::registry::{ApiPath, MetricsRegistry};
    use rand::SeedableRng;

    fn dispatcher() -> (Arc<Catalog>, Dispatcher<EntityRequest>, Arc<MetricsRegistry>) {
        let catalog = Arc::new(Catalog::seeded());
        let metrics = Arc::new(MetricsRegistry::new());
        let mut builder = Dispatcher::builder();
        catalog.register_handlers(&mut builder).unwrap();
        (catalog, builder.build(metrics.clone()), metrics)
    }

    #[test]
    fn test_action_type_names() {
        assert_eq!(action_type(Operation::GetAll, Entity::Animal), "GET_ALL_ANIMALS");
        assert_eq!(action_type(Operation::GetById, Entity::Car), "GET_CAR_BY_ID");
        assert_eq!(action_type(Operation::Create, Entity::Employee), "CREATE_EMPLOYEE");
        assert_eq!(action_type(Operation::Search, Entity::Car), "SEARCH_CARS");
        assert_eq!(action_type(Operation::Page, Entity::Employee), "GET_EMPLOYEES_PAGE");
    }

    #[test]
    fn test_all_handlers_registered() {
        let (_, dispatcher, _) = dispatcher();
        assert_eq!(dispatcher.action_types().count(), 21);
        assert!(dispatcher.has_handler("DELETE_ANIMAL"));
        assert!(dispatcher.has_handler("UPDATE_CAR"));
    }

    #[test]
    fn test_registering_twice_fails() {
        let catalog = Arc::new(Catalog::seeded());
        let mut builder = DispatcherBuilder::new();
        catalog.register_handlers(&mut builder).unwrap();
        assert!(catalog.register_handlers(&mut builder).is_err());
    }

    #[test]
    fn test_crud_through_dispatcher() {
        let (catalog, dispatcher, metrics) = dispatcher();

        let created = dispatcher
            .dispatch(&EntityRequest::new(
                Entity::Car,
                EntityRequestKind::Create { name: "Mazda".into() },
            ))
            .unwrap();
        assert!(created.success);
        let record: Record = serde_json::from_value(created.payload.unwrap()).unwrap();
        assert_eq!(record, Record { id: 3, name: "Mazda".into() });

        let updated = dispatcher
            .dispatch(&EntityRequest::new(
                Entity::Car,
                EntityRequestKind::Update { id: 3, name: "Subaru".into() },
            ))
            .unwrap();
        assert!(updated.success);
        assert_eq!(catalog.store(Entity::Car).get(3).unwrap().name, "Subaru");

        let deleted = dispatcher
            .dispatch(&EntityRequest::new(Entity::Car, EntityRequestKind::Delete { id: 3 }))
            .unwrap();
        assert!(deleted.success);

        let missing = dispatcher
            .dispatch(&EntityRequest::new(Entity::Car, EntityRequestKind::GetById { id: 3 }))
            .unwrap();
        assert!(!missing.success);
        assert!(missing.message.unwrap().contains("not found"));

        let b = metrics.metrics(ApiPath::B);
        assert_eq!(b.total_requests, 4);
        assert_eq!(b.failure_count, 1);
    }

    #[test]
    fn test_search_and_page() {
        let store = EntityStore::seeded(&["cat", "dog", "Catfish", "bird"]);
        let hits: Vec<_> = store.search("CAT").into_iter().map(|r| r.name).collect();
        assert_eq!(hits, vec!["cat", "Catfish"]);
        assert_eq!(store.search("").len(), 4);

        assert_eq!(store.page(0, 3).len(), 3);
        assert_eq!(store.page(1, 3).len(), 1);
        assert!(store.page(2, 3).is_empty());
        assert!(store.page(0, 0).is_empty());
    }

    #[test]
    fn test_blank_create_is_unsuccessful() {
        let (catalog, dispatcher, _) = dispatcher();
        let outcome = dispatcher
            .dispatch(&EntityRequest::new(
                Entity::Animal,
                EntityRequestKind::Create { name: "  ".into() },
            ))
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(catalog.store(Entity::Animal).len(), 2);
    }

    #[test]
    fn test_traffic_mix_cycles_and_resolves() {
        let (_, dispatcher, _) = dispatcher();
        let mix = TrafficMix::new();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        let first = mix.next_request(&mut rng);
        assert_eq!(first.action_type(), "GET_ALL_ANIMALS");
        let second = mix.next_request(&mut rng);
        assert_eq!(second.action_type(), "CREATE_ANIMAL");
        match second.kind() {
            EntityRequestKind::Create { name } => assert!(name.starts_with("TestAnimal")),
            other => panic!("unexpected kind: {other:?}"),
        }

        for _ in 0..16 {
            let req = mix.next_request(&mut rng);
            assert!(dispatcher.has_handler(req.action_type()), "{}", req.action_type());
        }
    }

    #[test]
    fn test_rest_calls_mirror_mix() {
        let calls = TrafficMix::rest_calls();
        assert_eq!(calls.len(), 8);
        assert_eq!(calls[0].path, "/api/animals");
        assert_eq!(calls[2].path, "/api/animals/1");
        assert_eq!(calls[3].path, "/api/animals/search?type=TestAnimal");
        assert_eq!(
            calls[5].body,
            Some(RestBody::RandomName {
                field: "brand".into(),
                prefix: "TestCar".into(),
            })
        );
    }
}
