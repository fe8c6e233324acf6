mod activity;
mod catalog;
mod chat;
mod helpers;
mod meal;
mod settings;
mod summary;
mod sync;

pub(crate) use activity::{ExerciseArgs, MetricArgs, cmd_beverage, cmd_exercise, cmd_fast, cmd_metric};
pub(crate) use catalog::{ComponentArgs, cmd_component_add, cmd_component_list, cmd_seed};
pub(crate) use chat::{cmd_chat, cmd_chat_log};
pub(crate) use meal::{cmd_meal_log, cmd_meal_preview};
pub(crate) use settings::{cmd_config_get, cmd_config_set, cmd_config_show, cmd_config_unset};
pub(crate) use summary::{cmd_status, cmd_summary};
pub(crate) use sync::cmd_sync;
