pub mod notifications;
pub mod users;

#[cfg(test)]
pub mod fakes {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{
        notifications::UnreadCounter,
        users::{StoreError, UserStore},
    };
    use crate::{
        auth::password::hash_password,
        model::{
            role::Role,
            user::{NewUser, UserCredentials, UserSummary},
        },
    };

    #[derive(Default)]
    pub struct InMemoryUserStore {
        users: Mutex<Vec<UserCredentials>>,
        pub fail: bool,
    }

    impl InMemoryUserStore {
        pub fn with_user(self, username: &str, password: &str, role: Role) -> Self {
            {
                let mut users = self.users.lock().unwrap();
                let id = users.len() as i64 + 1;
                users.push(UserCredentials {
                    id,
                    username: username.to_string(),
                    password: hash_password(password).unwrap(),
                    role: role.to_string(),
                });
            }
            self
        }

        pub fn with_raw_hash(self, username: &str, stored: &str) -> Self {
            {
                let mut users = self.users.lock().unwrap();
                let id = users.len() as i64 + 1;
                users.push(UserCredentials {
                    id,
                    username: username.to_string(),
                    password: stored.to_string(),
                    role: Role::Employee.to_string(),
                });
            }
            self
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn stored_hash(&self, username: &str) -> Option<String> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username == username)
                .map(|u| u.password.clone())
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.fail {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl UserStore for InMemoryUserStore {
        async fn find_by_username(&self, username: &str) -> Result<Option<UserCredentials>, StoreError> {
            self.check()?;
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username.eq_ignore_ascii_case(username))
                .cloned())
        }

        async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
            Ok(self.find_by_username(username).await?.is_some())
        }

        async fn create(&self, user: &NewUser) -> Result<i64, StoreError> {
            self.check()?;
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.username.eq_ignore_ascii_case(&user.username)) {
                return Err(StoreError::Duplicate);
            }
            let id = users.len() as i64 + 1;
            users.push(UserCredentials {
                id,
                username: user.username.clone(),
                password: user.password_hash.clone(),
                role: user.role.to_string(),
            });
            Ok(id)
        }

        async fn list(&self) -> Result<Vec<UserSummary>, StoreError> {
            self.check()?;
            let mut list: Vec<UserSummary> = self
                .users
                .lock()
                .unwrap()
                .iter()
                .map(|u| UserSummary {
                    id: u.id,
                    username: u.username.clone(),
                    role: u.role.clone(),
                })
                .collect();
            list.sort_by(|a, b| a.username.cmp(&b.username));
            Ok(list)
        }

        async fn reset_password(&self, user_id: i64, password_hash: &str) -> Result<Option<String>, StoreError> {
            self.check()?;
            let mut users = self.users.lock().unwrap();
            Ok(users.iter_mut().find(|u| u.id == user_id).map(|u| {
                u.password = password_hash.to_string();
                u.username.clone()
            }))
        }

        async fn count(&self) -> Result<i64, StoreError> {
            self.check()?;
            Ok(self.users.lock().unwrap().len() as i64)
        }
    }

    pub struct FixedUnreadCounter(pub i64);

    #[async_trait]
    impl UnreadCounter for FixedUnreadCounter {
        async fn unread_count(&self, _user_id: i64) -> Result<i64, sqlx::Error> {
            Ok(self.0)
        }
    }

    pub struct FailingUnreadCounter;

    #[async_trait]
    impl UnreadCounter for FailingUnreadCounter {
        async fn unread_count(&self, _user_id: i64) -> Result<i64, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}
