use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::debug;

use crate::message::model::Message;
use crate::thread::model::Thread;
use crate::{message, thread, user};

use super::model::{MessageDto, ParticipantDto, ThreadDto};

#[async_trait]
pub trait ChatService {
    /// Returns the thread shared by the initiator and the target, creating
    /// it first when the pair never talked. The boolean tells the caller
    /// whether the thread was just created.
    async fn start_or_get_thread(
        &self,
        initiator: &user::Id,
        target: &user::Username,
    ) -> super::Result<(ThreadDto, bool)>;

    async fn find_my_threads(&self, user_id: &user::Id) -> super::Result<Vec<ThreadDto>>;

    async fn delete_thread(&self, id: &thread::Id, acting_user: &user::Id) -> super::Result<()>;

    async fn find_messages(
        &self,
        thread_id: &thread::Id,
        requesting_user: &user::Id,
    ) -> super::Result<Vec<MessageDto>>;

    async fn post_message(
        &self,
        thread_id: &thread::Id,
        sender: &user::Id,
        text: &str,
    ) -> super::Result<MessageDto>;

    async fn set_read_state(
        &self,
        thread_id: &thread::Id,
        id: &message::Id,
        acting_user: &user::Id,
        read: bool,
    ) -> super::Result<MessageDto>;

    async fn unread_count(
        &self,
        thread_id: &thread::Id,
        requesting_user: &user::Id,
    ) -> super::Result<i64>;
}

#[derive(Clone)]
pub struct ChatServiceImpl {
    user_repo: user::Repository,
    thread_repo: thread::Repository,
    message_repo: message::Repository,
}

impl ChatServiceImpl {
    pub fn new(
        user_repo: user::Repository,
        thread_repo: thread::Repository,
        message_repo: message::Repository,
    ) -> Self {
        Self {
            user_repo,
            thread_repo,
            message_repo,
        }
    }
}

#[async_trait]
impl ChatService for ChatServiceImpl {
    async fn start_or_get_thread(
        &self,
        initiator: &user::Id,
        target: &user::Username,
    ) -> super::Result<(ThreadDto, bool)> {
        let target_user = self.user_repo.find_by_username(target)?;

        if target_user.id() == initiator {
            return Err(super::Error::SelfThread);
        }

        if let Some(existing) = self
            .thread_repo
            .find_by_participants(initiator, target_user.id())?
        {
            return Ok((self.thread_to_dto(existing)?, false));
        }

        match self.thread_repo.create(initiator, target_user.id()) {
            Ok(thread) => Ok((self.thread_to_dto(thread)?, true)),
            Err(
                thread::Error::AlreadyExists
                | thread::Error::_Diesel(DieselError::DatabaseError(
                    DatabaseErrorKind::SerializationFailure,
                    _,
                )),
            ) => {
                // lost the race, the pair got its thread in the meantime
                debug!("thread for {initiator} and {target} created concurrently");

                let thread = self
                    .thread_repo
                    .find_by_participants(initiator, target_user.id())?
                    .ok_or(thread::Error::AlreadyExists)?;

                Ok((self.thread_to_dto(thread)?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_my_threads(&self, user_id: &user::Id) -> super::Result<Vec<ThreadDto>> {
        let threads = self.thread_repo.find_all_by_participant(user_id)?;

        threads
            .into_iter()
            .map(|t| self.thread_to_dto(t))
            .collect()
    }

    async fn delete_thread(&self, id: &thread::Id, acting_user: &user::Id) -> super::Result<()> {
        self.thread_repo.delete(id, acting_user)?;
        Ok(())
    }

    async fn find_messages(
        &self,
        thread_id: &thread::Id,
        requesting_user: &user::Id,
    ) -> super::Result<Vec<MessageDto>> {
        let messages = self.message_repo.find_all(thread_id, requesting_user)?;

        let participant_ids = self.thread_repo.participants(thread_id)?;
        let participants = self.user_repo.find_all_by_ids(&participant_ids)?;

        let mut dtos = Vec::with_capacity(messages.len());
        for m in messages {
            let sender = participants
                .iter()
                .find(|u| u.id() == m.sender_id())
                .cloned()
                .map(ParticipantDto::from)
                .ok_or(message::Error::NotParticipant)?;
            dtos.push(MessageDto::new(&m, sender));
        }

        Ok(dtos)
    }

    async fn post_message(
        &self,
        thread_id: &thread::Id,
        sender: &user::Id,
        text: &str,
    ) -> super::Result<MessageDto> {
        let message = self.message_repo.create(thread_id, sender, text)?;
        self.message_to_dto(message)
    }

    async fn set_read_state(
        &self,
        thread_id: &thread::Id,
        id: &message::Id,
        acting_user: &user::Id,
        read: bool,
    ) -> super::Result<MessageDto> {
        let message = self
            .message_repo
            .set_read(thread_id, id, acting_user, read)?;
        self.message_to_dto(message)
    }

    async fn unread_count(
        &self,
        thread_id: &thread::Id,
        requesting_user: &user::Id,
    ) -> super::Result<i64> {
        let count = self.message_repo.count_unread(thread_id, requesting_user)?;
        Ok(count)
    }
}

impl ChatServiceImpl {
    fn thread_to_dto(&self, thread: Thread) -> super::Result<ThreadDto> {
        let participant_ids = self.thread_repo.participants(thread.id())?;
        let participants = self
            .user_repo
            .find_all_by_ids(&participant_ids)?
            .into_iter()
            .map(ParticipantDto::from)
            .collect();

        Ok(ThreadDto::new(&thread, participants))
    }

    fn message_to_dto(&self, message: Message) -> super::Result<MessageDto> {
        let sender = self.user_repo.find_by_id(message.sender_id())?;

        Ok(MessageDto::new(&message, ParticipantDto::from(sender)))
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::chat;
    use crate::message::repository::MessageRepository;
    use crate::thread::repository::ThreadRepository;
    use crate::user::model::{NewUser, User};
    use crate::user::repository::UserRepository;
    use crate::user::Username;

    use super::*;

    #[derive(Default)]
    struct TestStore {
        users: Mutex<Vec<User>>,
        threads: Mutex<Vec<(Thread, [user::Id; 2])>>,
        messages: Mutex<Vec<Message>>,
    }

    impl TestStore {
        fn seed_user(&self, username: &str) -> user::Id {
            let user = User::new(user::Id::random(), username);
            let id = user.id().to_owned();
            self.users.lock().unwrap().push(user);
            id
        }

        fn is_pair(members: &[user::Id; 2], a: &user::Id, b: &user::Id) -> bool {
            (&members[0] == a && &members[1] == b) || (&members[0] == b && &members[1] == a)
        }

        fn is_member(&self, thread_id: &thread::Id, user_id: &user::Id) -> bool {
            self.threads
                .lock()
                .unwrap()
                .iter()
                .any(|(t, members)| t.id() == thread_id && members.contains(user_id))
        }
    }

    impl UserRepository for TestStore {
        fn insert(&self, user: &NewUser) -> Result<(), user::Error> {
            self.users
                .lock()
                .unwrap()
                .push(User::new(user.id().to_owned(), user.username()));
            Ok(())
        }

        fn find_by_id(&self, id: &user::Id) -> Result<User, user::Error> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id() == id)
                .cloned()
                .ok_or(user::Error::_Diesel(DieselError::NotFound))
        }

        fn find_by_username(&self, username: &Username) -> Result<User, user::Error> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username() == username.as_str())
                .cloned()
                .ok_or_else(|| user::Error::NotFound(username.to_owned()))
        }

        fn find_all_by_ids(&self, ids: &[user::Id]) -> Result<Vec<User>, user::Error> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .filter(|u| ids.contains(u.id()))
                .cloned()
                .collect())
        }

        fn delete(&self, id: &user::Id) -> Result<(), user::Error> {
            self.users.lock().unwrap().retain(|u| u.id() != id);
            self.messages.lock().unwrap().retain(|m| m.sender_id() != id);
            Ok(())
        }
    }

    impl ThreadRepository for TestStore {
        fn create(&self, a: &user::Id, b: &user::Id) -> Result<Thread, thread::Error> {
            if a == b {
                return Err(thread::Error::SelfReference);
            }

            let mut threads = self.threads.lock().unwrap();
            if threads.iter().any(|(_, m)| Self::is_pair(m, a, b)) {
                return Err(thread::Error::AlreadyExists);
            }

            let thread = Thread::new();
            threads.push((thread.clone(), [a.to_owned(), b.to_owned()]));
            Ok(thread)
        }

        fn find_by_participants(
            &self,
            a: &user::Id,
            b: &user::Id,
        ) -> Result<Option<Thread>, thread::Error> {
            Ok(self
                .threads
                .lock()
                .unwrap()
                .iter()
                .find(|(_, m)| Self::is_pair(m, a, b))
                .map(|(t, _)| t.clone()))
        }

        fn find_by_id_and_participant(
            &self,
            id: &thread::Id,
            user_id: &user::Id,
        ) -> Result<Thread, thread::Error> {
            self.threads
                .lock()
                .unwrap()
                .iter()
                .find(|(t, m)| t.id() == id && m.contains(user_id))
                .map(|(t, _)| t.clone())
                .ok_or_else(|| thread::Error::NotFound(id.to_owned()))
        }

        fn find_all_by_participant(
            &self,
            user_id: &user::Id,
        ) -> Result<Vec<Thread>, thread::Error> {
            Ok(self
                .threads
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, m)| m.contains(user_id))
                .map(|(t, _)| t.clone())
                .collect())
        }

        fn participants(&self, id: &thread::Id) -> Result<Vec<user::Id>, thread::Error> {
            Ok(self
                .threads
                .lock()
                .unwrap()
                .iter()
                .find(|(t, _)| t.id() == id)
                .map(|(_, m)| m.to_vec())
                .unwrap_or_default())
        }

        fn delete(&self, id: &thread::Id, acting_user: &user::Id) -> Result<(), thread::Error> {
            if !self.is_member(id, acting_user) {
                return Err(thread::Error::NotFound(id.to_owned()));
            }

            self.threads.lock().unwrap().retain(|(t, _)| t.id() != id);
            self.messages
                .lock()
                .unwrap()
                .retain(|m| m.thread_id() != id);
            Ok(())
        }
    }

    impl MessageRepository for TestStore {
        fn create(
            &self,
            thread_id: &thread::Id,
            sender: &user::Id,
            text: &str,
        ) -> Result<Message, message::Error> {
            if text.is_empty() {
                return Err(message::Error::EmptyText);
            }

            let exists = self
                .threads
                .lock()
                .unwrap()
                .iter()
                .any(|(t, _)| t.id() == thread_id);
            if !exists {
                return Err(message::Error::ThreadNotFound(thread_id.to_owned()));
            }

            if !self.is_member(thread_id, sender) {
                return Err(message::Error::NotParticipant);
            }

            let message = Message::new(thread_id.to_owned(), sender.to_owned(), text);
            self.messages.lock().unwrap().push(message.clone());
            Ok(message)
        }

        fn find_all(
            &self,
            thread_id: &thread::Id,
            requesting_user: &user::Id,
        ) -> Result<Vec<Message>, message::Error> {
            if !self.is_member(thread_id, requesting_user) {
                return Err(message::Error::NotFound(None));
            }

            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.thread_id() == thread_id)
                .cloned()
                .collect())
        }

        fn set_read(
            &self,
            thread_id: &thread::Id,
            id: &message::Id,
            acting_user: &user::Id,
            read: bool,
        ) -> Result<Message, message::Error> {
            if !self.is_member(thread_id, acting_user) {
                return Err(message::Error::NotFound(Some(id.to_owned())));
            }

            let mut messages = self.messages.lock().unwrap();
            let message = messages
                .iter_mut()
                .find(|m| m.id() == id && m.thread_id() == thread_id)
                .ok_or_else(|| message::Error::NotFound(Some(id.to_owned())))?;

            if !read {
                return Err(message::Error::MarkUnread);
            }

            if message.sender_id() == acting_user {
                return Err(message::Error::SelfRead);
            }

            *message = message.with_read();
            Ok(message.clone())
        }

        fn count_unread(
            &self,
            thread_id: &thread::Id,
            requesting_user: &user::Id,
        ) -> Result<i64, message::Error> {
            if !self.is_member(thread_id, requesting_user) {
                return Err(message::Error::NotParticipant);
            }

            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| {
                    m.thread_id() == thread_id && !m.is_read() && m.sender_id() != requesting_user
                })
                .count() as i64)
        }
    }

    /// Hides existing threads from the first find, like a second writer
    /// committing between the service's lookup and its insert.
    struct RacyStore {
        inner: Arc<TestStore>,
        hidden_finds: AtomicUsize,
    }

    impl ThreadRepository for RacyStore {
        fn create(&self, a: &user::Id, b: &user::Id) -> Result<Thread, thread::Error> {
            ThreadRepository::create(self.inner.as_ref(), a, b)
        }

        fn find_by_participants(
            &self,
            a: &user::Id,
            b: &user::Id,
        ) -> Result<Option<Thread>, thread::Error> {
            if self.hidden_finds.load(Ordering::SeqCst) > 0 {
                self.hidden_finds.fetch_sub(1, Ordering::SeqCst);
                return Ok(None);
            }
            self.inner.find_by_participants(a, b)
        }

        fn find_by_id_and_participant(
            &self,
            id: &thread::Id,
            user_id: &user::Id,
        ) -> Result<Thread, thread::Error> {
            self.inner.find_by_id_and_participant(id, user_id)
        }

        fn find_all_by_participant(
            &self,
            user_id: &user::Id,
        ) -> Result<Vec<Thread>, thread::Error> {
            self.inner.find_all_by_participant(user_id)
        }

        fn participants(&self, id: &thread::Id) -> Result<Vec<user::Id>, thread::Error> {
            self.inner.participants(id)
        }

        fn delete(&self, id: &thread::Id, acting_user: &user::Id) -> Result<(), thread::Error> {
            ThreadRepository::delete(self.inner.as_ref(), id, acting_user)
        }
    }

    fn service(store: &Arc<TestStore>) -> ChatServiceImpl {
        ChatServiceImpl::new(store.clone(), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn should_create_thread_then_return_existing() {
        let store = Arc::new(TestStore::default());
        let jora = store.seed_user("jora");
        store.seed_user("valera");
        let service = service(&store);

        let (first, created) = service
            .start_or_get_thread(&jora, &Username::new("valera"))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.participants().len(), 2);

        let (second, created) = service
            .start_or_get_thread(&jora, &Username::new("valera"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id(), first.id());
    }

    #[tokio::test]
    async fn should_return_same_thread_from_either_side() {
        let store = Arc::new(TestStore::default());
        let jora = store.seed_user("jora");
        let valera = store.seed_user("valera");
        let service = service(&store);

        let (first, _) = service
            .start_or_get_thread(&jora, &Username::new("valera"))
            .await
            .unwrap();

        let (second, created) = service
            .start_or_get_thread(&valera, &Username::new("jora"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id(), first.id());
    }

    #[tokio::test]
    async fn should_reject_unknown_username() {
        let store = Arc::new(TestStore::default());
        let jora = store.seed_user("jora");
        let service = service(&store);

        let res = service
            .start_or_get_thread(&jora, &Username::new("valera"))
            .await;

        assert!(matches!(
            res,
            Err(chat::Error::_User(user::Error::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn should_reject_thread_with_yourself() {
        let store = Arc::new(TestStore::default());
        let jora = store.seed_user("jora");
        let service = service(&store);

        let res = service
            .start_or_get_thread(&jora, &Username::new("jora"))
            .await;

        assert!(matches!(res, Err(chat::Error::SelfThread)));
    }

    #[tokio::test]
    async fn should_return_existing_thread_when_create_races() {
        let store = Arc::new(TestStore::default());
        let jora = store.seed_user("jora");
        let valera = store.seed_user("valera");
        // the other writer already committed
        let existing = ThreadRepository::create(store.as_ref(), &jora, &valera).unwrap();

        let racy = Arc::new(RacyStore {
            inner: store.clone(),
            hidden_finds: AtomicUsize::new(1),
        });
        let service = ChatServiceImpl::new(store.clone(), racy, store.clone());

        let (dto, created) = service
            .start_or_get_thread(&jora, &Username::new("valera"))
            .await
            .unwrap();

        assert!(!created);
        assert_eq!(dto.id(), existing.id());
    }

    #[tokio::test]
    async fn should_run_conversation_round_trip() {
        let store = Arc::new(TestStore::default());
        let jora = store.seed_user("jora");
        let valera = store.seed_user("valera");
        let radu = store.seed_user("radu");
        let service = service(&store);

        let (thread, _) = service
            .start_or_get_thread(&jora, &Username::new("valera"))
            .await
            .unwrap();

        let posted = service
            .post_message(thread.id(), &jora, "salut")
            .await
            .unwrap();
        assert!(!posted.is_read());
        assert_eq!(posted.sender().id(), &jora);

        assert_eq!(service.unread_count(thread.id(), &valera).await.unwrap(), 1);
        assert_eq!(service.unread_count(thread.id(), &jora).await.unwrap(), 0);

        let read = service
            .set_read_state(thread.id(), posted.id(), &valera, true)
            .await
            .unwrap();
        assert!(read.is_read());
        assert_eq!(service.unread_count(thread.id(), &valera).await.unwrap(), 0);

        let second = service
            .post_message(thread.id(), &jora, "ce faci?")
            .await
            .unwrap();
        let res = service
            .set_read_state(thread.id(), second.id(), &jora, true)
            .await;
        assert!(matches!(
            res,
            Err(chat::Error::_Message(message::Error::SelfRead))
        ));

        let res = service.unread_count(thread.id(), &radu).await;
        assert!(matches!(
            res,
            Err(chat::Error::_Message(message::Error::NotParticipant))
        ));

        let listed = service.find_messages(thread.id(), &valera).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].text(), "salut");
    }

    #[tokio::test]
    async fn should_list_threads_and_delete_mine() {
        let store = Arc::new(TestStore::default());
        let jora = store.seed_user("jora");
        store.seed_user("valera");
        store.seed_user("radu");
        let service = service(&store);

        let (first, _) = service
            .start_or_get_thread(&jora, &Username::new("valera"))
            .await
            .unwrap();
        let (second, _) = service
            .start_or_get_thread(&jora, &Username::new("radu"))
            .await
            .unwrap();

        let mine = service.find_my_threads(&jora).await.unwrap();
        let ids: Vec<_> = mine.iter().map(ThreadDto::id).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);

        service.delete_thread(first.id(), &jora).await.unwrap();

        let mine = service.find_my_threads(&jora).await.unwrap();
        assert_eq!(mine.len(), 1);
    }
}
