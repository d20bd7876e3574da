mod logging;
mod render;

use admin_lists::api::ApiError;
use admin_lists::config::Config;
use admin_lists::coordinator::RequestCoordinator;
use admin_lists::crud::{CrudController, Identifiable};
use admin_lists::list::{ListController, SortOrder};
use admin_lists::resources::{self, Record, Resource, RESOURCES};
use admin_lists::tree::Tree;
use admin_lists::url_state::{Location, MemoryRouter};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "admin-lists")]
#[command(about = "Browse and edit admin console lists from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/admin-lists/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// API base URL, overriding the config file and environment
  #[arg(long, global = true)]
  base_url: Option<String>,

  /// Log at debug level
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the known resources
  Resources,

  /// Fetch one page of a resource list
  List {
    /// Resource name or alias
    resource: String,

    #[arg(short, long)]
    search: Option<String>,

    /// Filter as key=value; repeat a key to filter by several values
    #[arg(short, long = "filter", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    #[arg(long)]
    sort_by: Option<String>,

    #[arg(long, value_parser = parse_sort_order)]
    sort_order: Option<SortOrder>,

    #[arg(short, long)]
    page: Option<i64>,

    #[arg(long)]
    per_page: Option<i64>,
  },

  /// Fetch the list a console URL points at, e.g. "/admin/users?search=john&page=2"
  Open { location: String },

  /// Create an item from a JSON object
  Create {
    resource: String,
    #[arg(short, long)]
    data: String,
  },

  /// Update an item from a JSON object
  Update {
    resource: String,
    id: u64,
    #[arg(short, long)]
    data: String,
  },

  /// Delete one or more items
  Delete {
    resource: String,
    #[arg(required = true)]
    ids: Vec<u64>,
  },

  /// Show site settings
  Settings,

  /// Show an enumeration table, e.g. order-statuses
  Enum { name: String },

  /// Show a nested resource as an outline
  Tree {
    resource: String,
    #[arg(long, default_value_t = 500)]
    per_page: u32,
  },
}

fn parse_filter(s: &str) -> std::result::Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.trim().is_empty() => {
      Ok((key.trim().to_string(), value.to_string()))
    }
    _ => Err(format!("expected key=value, got '{}'", s)),
  }
}

fn parse_sort_order(s: &str) -> std::result::Result<SortOrder, String> {
  s.parse()
    .map_err(|()| format!("expected 'asc' or 'desc', got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = match logging::init(args.verbose) {
    Ok(guard) => Some(guard),
    Err(e) => {
      eprintln!("Logging disabled: {}", e);
      None
    }
  };

  let mut config = Config::load(args.config.as_deref())?;
  config.base_url_override = args.base_url;
  info!(base_url = %config.api_base_url(), "Starting");

  let coordinator = RequestCoordinator::from_config(&config)?;

  match args.command {
    Command::Resources => {
      print!("{}", render::resource_list(RESOURCES));
    }
    Command::List {
      resource,
      search,
      filters,
      sort_by,
      sort_order,
      page,
      per_page,
    } => {
      let resource = lookup(&resource)?;
      let mut location = Location::new(resource.route);
      if let Some(search) = search {
        location = location.with_query("search", search);
      }
      for (key, value) in filters {
        location = location.with_query(key, value);
      }
      if let Some(sort_by) = sort_by {
        location = location.with_query("sort_by", sort_by);
      }
      if let Some(order) = sort_order {
        location = location.with_query("sort_order", order.as_str());
      }
      if let Some(page) = page {
        location = location.with_query("page", page.to_string());
      }
      if let Some(per_page) = per_page {
        location = location.with_query("per_page", per_page.to_string());
      }
      show_list(&coordinator, &config, resource, location).await?;
    }
    Command::Open { location } => {
      let location = parse_location(&location);
      let path = location.path.trim_end_matches('/');
      let resource = RESOURCES
        .iter()
        .find(|r| r.route == path)
        .ok_or_else(|| eyre!("No list lives at {}", location.path))?;
      show_list(&coordinator, &config, resource, location).await?;
    }
    Command::Create { resource, data } => {
      let crud = crud_for(&coordinator, &config, lookup(&resource)?);
      crud.open_create();
      let response = crud
        .create_item(parse_json(&data)?)
        .await
        .map_err(|e| explain(&crud, e))?;
      println!("{}", response.message.as_deref().unwrap_or("Created"));
    }
    Command::Update { resource, id, data } => {
      let crud = crud_for(&coordinator, &config, lookup(&resource)?);
      crud.open_edit(id);
      let response = crud
        .update_item(id, parse_json(&data)?)
        .await
        .map_err(|e| explain(&crud, e))?;
      println!("{}", response.message.as_deref().unwrap_or("Updated"));
    }
    Command::Delete { resource, ids } => {
      let crud = crud_for(&coordinator, &config, lookup(&resource)?);
      for id in &ids {
        crud.toggle_selection(*id);
      }
      crud.confirm_delete(crud.selected_items());
      let deleted = crud.delete_selected_items().await?;
      println!("Deleted {} item(s)", deleted);
    }
    Command::Settings => {
      let settings = coordinator.settings().await?;
      println!("{}", serde_json::to_string_pretty(&settings.data)?);
    }
    Command::Enum { name } => {
      let table = coordinator.lookup_table(&name).await?;
      println!("{}", serde_json::to_string_pretty(&table.data)?);
    }
    Command::Tree { resource, per_page } => {
      let resource = lookup(&resource)?;
      if !resource.nested {
        return Err(eyre!("{} is not a nested resource", resource.name));
      }
      let options = resource.list_options(&config.lists).per_page(per_page);
      let controller: ListController<Record> = ListController::new(coordinator.clone(), options);
      let page = controller.fetch_data(None).await?;
      if page.meta.last_page > 1 {
        eprintln!(
          "Showing the first {} of {} items; raise --per-page to see all",
          page.items.len(),
          page.meta.total
        );
      }

      let tree = Tree::build(page.items, Record::item_id, Record::parent_id)?;
      print!("{}", render::outline(&tree, "name"));
    }
  }

  Ok(())
}

fn lookup(name: &str) -> Result<&'static Resource> {
  resources::find(name).ok_or_else(|| {
    let names: Vec<&str> = RESOURCES.iter().map(|r| r.name).collect();
    eyre!("Unknown resource '{}' (known: {})", name, names.join(", "))
  })
}

/// Accept a path with query, or a full console URL.
fn parse_location(input: &str) -> Location {
  match Url::parse(input) {
    Ok(url) => url
      .query_pairs()
      .fold(Location::new(url.path()), |location, (key, value)| {
        location.with_query(key, value)
      }),
    Err(_) => Location::from(input),
  }
}

fn parse_json(data: &str) -> Result<Value> {
  serde_json::from_str(data).map_err(|e| eyre!("Invalid JSON for --data: {}", e))
}

fn crud_for(
  coordinator: &RequestCoordinator,
  config: &Config,
  resource: &Resource,
) -> CrudController<Record> {
  let list = ListController::new(coordinator.clone(), resource.list_options(&config.lists));
  CrudController::new(list)
}

/// Turn a failed mutation into a report listing any field errors.
fn explain(crud: &CrudController<Record>, err: ApiError) -> color_eyre::Report {
  let form_errors = crud.form_errors();
  if form_errors.is_empty() {
    return err.into();
  }
  let details: Vec<String> = form_errors
    .iter()
    .map(|(field, messages)| format!("  {}: {}", field, messages.join(" ")))
    .collect();
  eyre!("{}\n{}", err, details.join("\n"))
}

async fn show_list(
  coordinator: &RequestCoordinator,
  config: &Config,
  resource: &Resource,
  location: Location,
) -> Result<()> {
  let controller: ListController<Record> =
    ListController::builder(coordinator.clone(), resource.list_options(&config.lists))
      .router(Arc::new(MemoryRouter::new(location)))
      .build();

  let page = controller.fetch_data(None).await?;
  print!("{}", render::table(resource.columns, &page.items));
  println!("{}", render::pagination_summary(&page.meta));
  Ok(())
}
