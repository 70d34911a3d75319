//! End-to-end scenarios over the public API.
//!
//! Every test gets its own freshly migrated in-memory database.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use proptest::prelude::*;
use yabe::db::repositories::{
    CommentRepository, PostRepository, SqlxCommentRepository, SqlxPostRepository,
    SqlxTagRepository, SqlxUserRepository, UserRepository,
};
use yabe::db::{create_test_pool, migrations, DynDatabasePool};
use yabe::fixtures;
use yabe::models::{format_cloud, CreateCommentInput, CreatePostInput, Post, User};
use yabe::services::{PostService, TagService, UserService};

struct Blog {
    users: SqlxUserRepository,
    posts: SqlxPostRepository,
    comments: SqlxCommentRepository,
    user_service: UserService,
    post_service: PostService,
    tag_service: TagService,
    pool: DynDatabasePool,
}

async fn setup() -> Blog {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    Blog {
        users: SqlxUserRepository::new(pool.clone()),
        posts: SqlxPostRepository::new(pool.clone()),
        comments: SqlxCommentRepository::new(pool.clone()),
        user_service: UserService::new(SqlxUserRepository::boxed(pool.clone())),
        post_service: PostService::from_pool(pool.clone()),
        tag_service: TagService::new(SqlxTagRepository::boxed(pool.clone())),
        pool,
    }
}

async fn load_sample_data(blog: &Blog) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/data.yml");
    fixtures::load_models(&blog.pool, path)
        .await
        .expect("Failed to load fixtures");
}

#[tokio::test]
async fn create_and_retrieve_user() {
    let blog = setup().await;

    blog.users
        .create(&User::new("bob@gmail.com", "secret", "Bob Silva"))
        .await
        .expect("Failed to save user");

    let bob = blog
        .users
        .get_by_email("bob@gmail.com")
        .await
        .unwrap()
        .expect("bob not found");
    assert_eq!(bob.fullname, "Bob Silva");
}

#[tokio::test]
async fn try_connect_as_user() {
    let blog = setup().await;
    blog.users
        .create(&User::new("bob@gmail.com", "secret", "Bob"))
        .await
        .unwrap();

    let svc = &blog.user_service;
    assert!(svc.connect("bob@gmail.com", "secret").await.unwrap().is_some());
    assert!(svc.connect("bob@gmail.com", "badpassword").await.unwrap().is_none());
    assert!(svc.connect("tom@gmail.com", "secret").await.unwrap().is_none());
}

#[tokio::test]
async fn create_post() {
    let blog = setup().await;
    let bob = blog
        .users
        .create(&User::new("bob@gmail.com", "secret", "Bob"))
        .await
        .unwrap();

    blog.posts
        .create(&CreatePostInput::from(&Post::new(&bob, "My First Post", "Hello World!")))
        .await
        .expect("Failed to save post");

    assert_eq!(blog.posts.count().await.unwrap(), 1);

    let bob_posts = blog.posts.find_by_author(bob.id).await.unwrap();
    assert_eq!(bob_posts.len(), 1);

    let first_post = &bob_posts[0];
    assert_eq!(first_post.author_id, bob.id);
    assert_eq!(first_post.title, "My First Post");
    assert_eq!(first_post.content, "Hello World!");
    assert!(first_post.posted_at.timestamp() > 0);
}

#[tokio::test]
async fn post_comments() {
    let blog = setup().await;
    let bob = blog
        .users
        .create(&User::new("bob@gmail.com", "secret", "Bob"))
        .await
        .unwrap();
    let bob_post = blog
        .posts
        .create(&CreatePostInput::from(&Post::new(&bob, "My first post", "Hello world")))
        .await
        .unwrap();

    blog.comments
        .create(&CreateCommentInput::new(bob_post.id, "Jeff", "Nice post"))
        .await
        .unwrap();
    blog.comments
        .create(&CreateCommentInput::new(bob_post.id, "Tom", "I knew that !"))
        .await
        .unwrap();

    let bob_post_comments = blog.comments.find_by_post(bob_post.id).await.unwrap();
    assert_eq!(bob_post_comments.len(), 2);

    let first = &bob_post_comments[0];
    assert_eq!(first.author, "Jeff");
    assert_eq!(first.content, "Nice post");
    assert!(first.posted_at.timestamp() > 0);

    let second = &bob_post_comments[1];
    assert_eq!(second.author, "Tom");
    assert_eq!(second.content, "I knew that !");
    assert!(second.posted_at.timestamp() > 0);
}

#[tokio::test]
async fn use_the_comments_relation() {
    let blog = setup().await;
    let bob = blog
        .users
        .create(&User::new("bob@gmail.com", "secret", "Bob"))
        .await
        .unwrap();
    let bob_post = blog
        .post_service
        .create(CreatePostInput::from(&Post::new(&bob, "My first post", "Hello world")))
        .await
        .unwrap();

    blog.post_service.add_comment(bob_post.id, "Jeff", "Nice post").await.unwrap();
    blog.post_service.add_comment(bob_post.id, "Tom", "I knew that !").await.unwrap();

    assert_eq!(blog.users.count().await.unwrap(), 1);
    assert_eq!(blog.posts.count().await.unwrap(), 1);
    assert_eq!(blog.comments.count().await.unwrap(), 2);

    let detail = blog.post_service.get_detail(bob_post.id).await.unwrap();
    assert_eq!(detail.comments.len(), 2);
    assert_eq!(detail.comments[0].author, "Jeff");

    blog.post_service.delete(bob_post.id).await.unwrap();

    assert_eq!(blog.users.count().await.unwrap(), 1);
    assert_eq!(blog.posts.count().await.unwrap(), 0);
    assert_eq!(blog.comments.count().await.unwrap(), 0);
}

#[tokio::test]
async fn full_test() {
    let blog = setup().await;
    load_sample_data(&blog).await;

    assert_eq!(blog.users.count().await.unwrap(), 2);
    assert_eq!(blog.posts.count().await.unwrap(), 3);
    assert_eq!(blog.comments.count().await.unwrap(), 3);

    let svc = &blog.user_service;
    assert!(svc.connect("bob@gmail.com", "secret").await.unwrap().is_some());
    assert!(svc.connect("jeff@gmail.com", "secret").await.unwrap().is_some());
    assert!(svc.connect("jeff@gmail.com", "badpassword").await.unwrap().is_none());
    assert!(svc.connect("tom@gmail.com", "secret").await.unwrap().is_none());

    let bob_posts = blog.posts.find_by_author_email("bob@gmail.com").await.unwrap();
    assert_eq!(bob_posts.len(), 2);

    let bob_comments = blog
        .comments
        .find_by_post_author_email("bob@gmail.com")
        .await
        .unwrap();
    assert_eq!(bob_comments.len(), 3);

    let front_post = blog
        .post_service
        .front_post()
        .await
        .unwrap()
        .expect("No front post");
    assert_eq!(front_post.title, "About the model layer");
    assert_eq!(blog.post_service.comments(front_post.id).await.unwrap().len(), 2);

    blog.post_service
        .add_comment(front_post.id, "Jim", "Hello guys")
        .await
        .unwrap();
    assert_eq!(blog.post_service.comments(front_post.id).await.unwrap().len(), 3);
    assert_eq!(blog.comments.count().await.unwrap(), 4);
}

#[tokio::test]
async fn navigate_sample_posts() {
    let blog = setup().await;
    load_sample_data(&blog).await;
    let svc = &blog.post_service;

    let front = svc.front_post().await.unwrap().expect("No front post");
    let previous = svc.previous(&front).await.unwrap().expect("No previous post");
    assert_eq!(previous.title, "The MVC application");
    assert!(svc.next(&front).await.unwrap().is_none());

    let oldest = svc.previous(&previous).await.unwrap().expect("No oldest post");
    assert_eq!(oldest.title, "Just a test of YABE");
    assert!(svc.previous(&oldest).await.unwrap().is_none());
    assert_eq!(svc.next(&oldest).await.unwrap(), Some(previous));
}

#[tokio::test]
async fn delete_user_cascades_to_posts() {
    let blog = setup().await;
    load_sample_data(&blog).await;

    let bob = blog
        .user_service
        .get_by_email("bob@gmail.com")
        .await
        .unwrap()
        .expect("bob not loaded");
    blog.user_service.delete(bob.id).await.unwrap();

    assert_eq!(blog.users.count().await.unwrap(), 1);
    assert_eq!(blog.posts.count().await.unwrap(), 1);
    assert_eq!(blog.comments.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_tags() {
    let blog = setup().await;
    let bob = blog
        .users
        .create(&User::new("bob@gmail.com", "secret", "Bob"))
        .await
        .unwrap();
    let svc = &blog.post_service;

    let bob_post = svc
        .create(CreatePostInput::from(&Post::new(&bob, "My first post", "Hello world")))
        .await
        .unwrap();
    let another_bob_post = svc
        .create(CreatePostInput::from(&Post::new(&bob, "Hop", "Hello world")))
        .await
        .unwrap();

    assert_eq!(svc.find_tagged_with(&["Red"]).await.unwrap().len(), 0);

    let bob_post = svc.tag_it_with(&bob_post, "Red").await.unwrap();
    svc.tag_it_with(&bob_post, "Blue").await.unwrap();
    let another_bob_post = svc.tag_it_with(&another_bob_post, "Red").await.unwrap();
    svc.tag_it_with(&another_bob_post, "Green").await.unwrap();

    assert_eq!(svc.find_tagged_with(&["Red"]).await.unwrap().len(), 2);
    assert_eq!(svc.find_tagged_with(&["Blue"]).await.unwrap().len(), 1);
    assert_eq!(svc.find_tagged_with(&["Green"]).await.unwrap().len(), 1);
    assert_eq!(svc.find_tagged_with(&["Red", "Blue"]).await.unwrap().len(), 1);
    assert_eq!(svc.find_tagged_with(&["Red", "Green"]).await.unwrap().len(), 1);
    assert_eq!(svc.find_tagged_with(&["Red", "Green", "Blue"]).await.unwrap().len(), 0);
    assert_eq!(svc.find_tagged_with(&["Green", "Blue"]).await.unwrap().len(), 0);

    let cloud = blog.tag_service.get_cloud().await.unwrap();
    assert_eq!(
        format_cloud(&cloud),
        "[{tag=Blue, pound=1}, {tag=Green, pound=1}, {tag=Red, pound=2}]"
    );
}

const TAG_NAMES: [&str; 4] = ["Red", "Green", "Blue", "Yellow"];

/// Tag posts per `assignments`, then check `query` against a set computed
/// in memory.
async fn check_intersection(assignments: Vec<BTreeSet<usize>>, query: Vec<usize>) {
    let blog = setup().await;
    let bob = blog
        .users
        .create(&User::new("bob@gmail.com", "secret", "Bob"))
        .await
        .unwrap();

    let mut expected = HashSet::new();
    let wanted: BTreeSet<usize> = query.iter().copied().collect();

    for (i, tags) in assignments.iter().enumerate() {
        let post = blog
            .post_service
            .create(CreatePostInput::from(&Post::new(&bob, format!("Post {}", i), "Hello")))
            .await
            .unwrap();
        for &tag in tags {
            blog.post_service.tag_it_with(&post, TAG_NAMES[tag]).await.unwrap();
        }
        if !wanted.is_empty() && wanted.is_subset(tags) {
            expected.insert(post.id);
        }
    }

    let names: Vec<&str> = query.iter().map(|&i| TAG_NAMES[i]).collect();
    let found: HashSet<i64> = blog
        .post_service
        .find_tagged_with(&names)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();

    assert_eq!(found, expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn tag_intersection_matches_set_semantics(
        assignments in prop::collection::vec(prop::collection::btree_set(0..4usize, 0..4), 0..5),
        query in prop::collection::vec(0..4usize, 0..4),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(check_intersection(assignments, query));
    }
}
