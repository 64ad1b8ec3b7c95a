//! SeaORM entity models

mod abstract_record;
mod event_settings;

pub use abstract_record::{
    ActiveModel as AbstractActiveModel,
    Column as AbstractColumn,
    Entity as AbstractEntity,
    Model as AbstractRow,
};

pub use event_settings::{
    ActiveModel as EventSettingsActiveModel,
    Column as EventSettingsColumn,
    Entity as EventSettingsEntity,
    Model as EventSettingsRow,
};
