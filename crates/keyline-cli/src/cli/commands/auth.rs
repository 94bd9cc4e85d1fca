//! Register, login, logout and status handlers.

use anyhow::Result;
use keyline_core::controller::SessionController;
use keyline_core::validation::RegistrationForm;

use super::{finished, read_line};

pub struct RegisterArgs<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

pub async fn register(controller: &SessionController, args: RegisterArgs<'_>) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => read_line("Password")?,
    };
    let confirm_password = match args.confirm_password {
        Some(confirm) => confirm,
        None => read_line("Confirm password")?,
    };

    let form = RegistrationForm {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        password: &password,
        confirm_password: &confirm_password,
    };
    let message = finished(controller.register(&form).await)?;

    if message.trim().is_empty() {
        println!("Registration successful");
    } else {
        println!("{}", message.trim());
    }
    Ok(())
}

pub async fn login(
    controller: &SessionController,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_line("Password")?,
    };

    let success = finished(controller.login(email, &password).await)?;
    println!("Logged in as {}", success.user.email);
    Ok(())
}

pub async fn logout(controller: &SessionController) -> Result<()> {
    let session = controller.session();
    let token = session.token().unwrap_or_default();

    // Clears any stale cached user too.
    controller.logout(token).await?;

    if token.is_empty() {
        println!("Not logged in");
    } else {
        println!("Logged out");
    }
    Ok(())
}

pub fn status(controller: &SessionController) -> Result<()> {
    let session = controller.stored_session()?;
    match (session.token(), session.user.as_ref()) {
        (Some(_), Some(user)) => {
            println!("Logged in as {} <{}>", user.display_name(), user.email);
        }
        (Some(_), None) => println!("Logged in (no cached profile)"),
        (None, _) => println!("Not logged in"),
    }
    println!("API: {}", controller.client().base_url());
    Ok(())
}
