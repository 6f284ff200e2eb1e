//! Purpose: Hold top-level CLI command dispatch for `storefront`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Protected commands check the session gate before any request.
//! Invariants: Only a successful sign-in writes the session.

use super::*;
use storefront::api::{
    AddToCartRequest, CartAction, CodeResetRequest, LoginRequest, RateProductRequest,
    RegisterRequest, RelatedFilter, RequestCodeResetRequest,
};

pub(super) fn dispatch_command(
    command: Command,
    config: &ClientConfig,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    if let Command::Completion { shell } = command {
        let mut cmd = Cli::command();
        clap_complete::aot::generate(shell, &mut cmd, "storefront", &mut io::stdout());
        return Ok(RunOutcome::ok());
    }

    let client = StorefrontClient::from_config(config)?;
    match command {
        Command::Completion { .. } => Ok(RunOutcome::ok()),
        Command::Login { username, code } => {
            let request = LoginRequest::from_form(&username, &code)?;
            let result = client.finish_sign_in(drive(client.auth().sign_in(&request))?);
            let result = result.map(|envelope| {
                json!({
                    "message": envelope.message,
                    "status_code": envelope.status_code,
                    "success": envelope.success,
                    "data": identity_json(&envelope.data),
                })
            });
            finish(result, color_mode)
        }
        Command::Signup {
            email,
            username,
            location,
            age,
            gender,
        } => {
            let request = RegisterRequest::from_form(&email, &username, &location, age, &gender)?;
            finish(drive(client.auth().sign_up(&request))?, color_mode)
        }
        Command::RequestCodeReset { username, email } => {
            let request = RequestCodeResetRequest::from_form(&username, &email)?;
            finish(drive(client.auth().request_code_reset(&request))?, color_mode)
        }
        Command::ResetCode {
            old_code,
            new_code,
            reset_token,
        } => {
            let request = CodeResetRequest::from_form(&new_code, &old_code, &reset_token)?;
            finish(drive(client.auth().reset_code(&request))?, color_mode)
        }
        Command::Logout => {
            let was_signed_in = client.session().is_authenticated();
            client.logout()?;
            emit_json(json!({ "signed_out": was_signed_in }));
            Ok(RunOutcome::ok())
        }
        Command::Whoami => {
            let Some(identity) = client.session().current_identity() else {
                return Err(Error::new(ErrorKind::NotFound)
                    .with_message("not signed in")
                    .with_hint("Run `storefront login <username> --code <code>` first."));
            };
            emit_json(identity_json(&identity));
            Ok(RunOutcome::ok())
        }
        Command::Home => finish(drive(client.home())?, color_mode),
        Command::Categories => finish(drive(client.catalog().categories())?, color_mode),
        Command::Product { id } => {
            let outcome = drive(client.catalog().product(&id))?;
            finish(client.finish_view(&id, outcome), color_mode)
        }
        Command::Search { name } => finish(drive(client.catalog().search(&name))?, color_mode),
        Command::Category { id } => {
            finish(drive(client.catalog().by_category(&id))?, color_mode)
        }
        Command::Related {
            id,
            location,
            max_price,
            category_id,
        } => {
            let filter = RelatedFilter {
                location,
                max_price,
                category_id,
            };
            finish(drive(client.catalog().related(&id, &filter))?, color_mode)
        }
        Command::Cart { command } => {
            require_session(&client)?;
            let cart = client.cart();
            match command {
                CartCommand::Show => finish(drive(cart.cart())?, color_mode),
                CartCommand::Add {
                    product_id,
                    quantity,
                } => {
                    let request = AddToCartRequest::new(&product_id, quantity, CartAction::Add)?;
                    finish(drive(cart.add_to_cart(&request))?, color_mode)
                }
                CartCommand::Decrease {
                    product_id,
                    quantity,
                } => {
                    let request =
                        AddToCartRequest::new(&product_id, quantity, CartAction::Remove)?;
                    finish(drive(cart.add_to_cart(&request))?, color_mode)
                }
                CartCommand::Remove { product_id } => {
                    finish(drive(cart.remove_from_cart(&product_id))?, color_mode)
                }
                CartCommand::Empty => finish(drive(cart.empty_cart())?, color_mode),
            }
        }
        Command::Checkout { receipt_email } => {
            require_session(&client)?;
            finish(drive(client.cart().checkout(&receipt_email)?)?, color_mode)
        }
        Command::Orders => {
            require_session(&client)?;
            finish(drive(client.cart().orders())?, color_mode)
        }
        Command::Rate { product_id, rating } => {
            require_session(&client)?;
            let request = RateProductRequest::new(&product_id, rating)?;
            finish(drive(client.cart().rate_product(&request))?, color_mode)
        }
    }
}

/// Identity without the bearer token.
fn identity_json(identity: &storefront::api::SessionIdentity) -> Value {
    json!({
        "id": identity.id,
        "username": identity.username,
        "location": identity.location,
        "age": identity.age,
        "gender": identity.gender,
        "created_at": identity.created_at,
        "updated_at": identity.updated_at,
    })
}
