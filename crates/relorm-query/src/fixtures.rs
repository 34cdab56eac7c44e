//! Hand-written models for this crate's unit tests.

use relorm_core::decode;
use relorm_core::{FieldInfo, Loaded, Model, Relation, Relations, Row, Value, ZeroValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Member {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
}

static TEAM_FIELDS: &[FieldInfo] = &[
    FieldInfo::new("id", "id", "i64")
        .constraints("primary key,auto_increment")
        .primary_key(true)
        .auto_increment(true),
    FieldInfo::new("name", "name", "String").constraints("not null"),
];

static MEMBER_FIELDS: &[FieldInfo] = &[
    FieldInfo::new("id", "id", "i64")
        .constraints("primary key,auto_increment")
        .primary_key(true)
        .auto_increment(true),
    FieldInfo::new("team_id", "team_id", "i64"),
    FieldInfo::new("name", "name", "String"),
];

impl Model for Team {
    const TABLE_NAME: &'static str = "teams";
    const PRIMARY_KEY: &'static str = "id";

    fn fields() -> &'static [FieldInfo] {
        TEAM_FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![("id", Value::BigInt(self.id)), ("name", Value::from(&self.name))]
    }

    fn changed_row(&self) -> Vec<(&'static str, Value)> {
        let mut row = Vec::new();
        if !self.id.is_zero_value() {
            row.push(("id", Value::BigInt(self.id)));
        }
        if !self.name.is_zero_value() {
            row.push(("name", Value::from(&self.name)));
        }
        row
    }

    fn from_row(row: &Row) -> relorm_core::Result<Self> {
        let mapped = decode::mapped_row::<Self>(row);
        Ok(Self {
            id: decode::field(&mapped, "id"),
            name: decode::field(&mapped, "name"),
            members: Vec::new(),
        })
    }

    fn set_generated_id(&mut self, id: i64) {
        self.id = id;
    }

    fn register_relations(relations: &mut Relations<Self>) {
        relations.register(Relation::<Self, Member>::has_many(
            "members",
            "team_id",
            "id",
            |team, loaded| {
                if let Loaded::Many(members) = loaded {
                    team.members = members;
                }
            },
        ));
    }
}

impl Model for Member {
    const TABLE_NAME: &'static str = "members";
    const PRIMARY_KEY: &'static str = "id";

    fn fields() -> &'static [FieldInfo] {
        MEMBER_FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::BigInt(self.id)),
            ("team_id", Value::BigInt(self.team_id)),
            ("name", Value::from(&self.name)),
        ]
    }

    fn changed_row(&self) -> Vec<(&'static str, Value)> {
        self.to_row()
            .into_iter()
            .filter(|(_, v)| !v.is_zero_value())
            .collect()
    }

    fn from_row(row: &Row) -> relorm_core::Result<Self> {
        let mapped = decode::mapped_row::<Self>(row);
        Ok(Self {
            id: decode::field(&mapped, "id"),
            team_id: decode::field(&mapped, "team_id"),
            name: decode::field(&mapped, "name"),
        })
    }

    fn set_generated_id(&mut self, id: i64) {
        self.id = id;
    }
}

pub fn block_on<F: Future>(future: F) -> F::Output {
    asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime")
        .block_on(future)
}

pub fn member_row(id: i64, team_id: i64) -> Row {
    Row::from_pairs([
        ("id", Value::BigInt(id)),
        ("team_id", Value::BigInt(team_id)),
        ("name", Value::Text(format!("m{id}"))),
    ])
}

pub fn team_row(id: i64, name: &str) -> Row {
    Row::from_pairs([("id", Value::BigInt(id)), ("name", Value::from(name))])
}
